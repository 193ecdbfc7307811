//! Bridge error taxonomy

use thiserror::Error;

use crate::guest::{GuestException, GuestFault, GuestSymbol};

const PRECHECK_PRELUDE: &str = "A guest error has occurred before entering the bridge function. \
This is an internal library error and should be reported to the developer. ";

const POSTCHECK_PRELUDE: &str = "A guest error has occurred before the bridge function exited. \
This is an internal library error and should be reported to the developer. ";

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Which error channel a failure came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bridge itself is in a state it should never be in.
    Invariant,
    /// The guest raised during the call.
    GuestException,
    /// The guest returned a falsy result; its error list explains why.
    GuestDomain,
    /// Rejected before reaching the guest.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("{}No guest session is active; init must succeed before any other call.", PRECHECK_PRELUDE)]
    NotInitialized,

    /// Exception already pending when an operation started.
    #[error("{}{}", PRECHECK_PRELUDE, .0)]
    StaleException(GuestException),

    /// Exception still pending when an operation was about to return.
    #[error("{}{}", POSTCHECK_PRELUDE, .0)]
    LingeringException(GuestException),

    #[error("{0}")]
    Exception(GuestException),

    /// Text from the data model's `errors_string()`.
    #[error("{0}")]
    Domain(String),

    /// Falsy result and an empty guest error list.
    #[error("unknown error")]
    Unknown,

    #[error("negative medtile idx forbidden.")]
    NegativeTile,

    #[error("No such world exists")]
    NoSuchWorld,

    #[error("Invalid mirror tile return")]
    InvalidMirrorTile,

    #[error("{0}")]
    Marshal(String),

    #[error("failure to invoke {0}()")]
    Invoke(String),

    #[error("{}", .0.missing_message())]
    MissingSymbol(GuestSymbol),

    #[error("the bridge requires a more recent version of the guest library. (format {installed} is installed, but at least format {required} is needed)")]
    FormatTooOld { installed: u64, required: u64 },

    #[error("unable to start guest runtime: {0}")]
    Startup(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotInitialized
            | BridgeError::StaleException(_)
            | BridgeError::LingeringException(_) => ErrorKind::Invariant,
            BridgeError::Exception(_) => ErrorKind::GuestException,
            BridgeError::Domain(_) | BridgeError::Unknown | BridgeError::InvalidMirrorTile => {
                ErrorKind::GuestDomain
            }
            BridgeError::NegativeTile
            | BridgeError::NoSuchWorld
            | BridgeError::Marshal(_)
            | BridgeError::Invoke(_)
            | BridgeError::MissingSymbol(_)
            | BridgeError::FormatTooOld { .. }
            | BridgeError::Startup(_) => ErrorKind::Validation,
        }
    }
}

impl From<GuestFault> for BridgeError {
    fn from(fault: GuestFault) -> Self {
        match fault {
            GuestFault::Exception(exception) => BridgeError::Exception(exception),
            GuestFault::Marshal(message) => BridgeError::Marshal(message),
            GuestFault::Invoke(target) => BridgeError::Invoke(target),
            GuestFault::MissingSymbol(symbol) => BridgeError::MissingSymbol(symbol),
            GuestFault::Runtime(message) => BridgeError::Startup(message),
        }
    }
}
