//! Narrow interfaces onto the guest library
//!
//! The bridge never reflects over guest objects. A binding implements these
//! traits and does whatever dynamic dispatch its runtime needs; every guest
//! call comes back as a `GuestResult`, with exceptions already trapped and
//! cleared on the guest side.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::settings::Settings;

/// Second argument the guest script sees; tells it to skip its own UI.
pub const LIB_MODE_FLAG: &str = "--as-lib";

/// Index into the data model's `worlds` sequence.
pub type WorldIndex = i32;

/// Medtile index within a world.
pub type TileIndex = i32;

pub type GuestResult<T> = Result<T, GuestFault>;

/// An exception raised inside the guest runtime.
///
/// `details` holds the formatted trace when the diagnostic formatter was
/// available and succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestException {
    details: Option<String>,
}

impl GuestException {
    pub fn decoded(details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
        }
    }

    pub fn undecoded() -> Self {
        Self { details: None }
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for GuestException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("A guest exception occurred.")?;
        match &self.details {
            Some(details) => write!(f, "\n{details}"),
            None => f.write_str(" (unable to decode exception details)"),
        }
    }
}

/// Exports the guest library must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestSymbol {
    Constants,
    Util,
    MMData,
}

impl GuestSymbol {
    pub fn name(self) -> &'static str {
        match self {
            GuestSymbol::Constants => "constants",
            GuestSymbol::Util => "util",
            GuestSymbol::MMData => "MMData",
        }
    }

    pub fn missing_message(self) -> &'static str {
        match self {
            GuestSymbol::Constants | GuestSymbol::Util => {
                "unable to access src.constants or src.util modules"
            }
            GuestSymbol::MMData => "unable to access class src.mmdata.MMData",
        }
    }
}

/// Failure reported by a binding for a single guest interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestFault {
    #[error("{0}")]
    Exception(GuestException),

    /// A host value could not be turned into a guest value, or back.
    #[error("{0}")]
    Marshal(String),

    /// A guest function could not be called at all; nothing was thrown.
    #[error("failure to invoke {0}()")]
    Invoke(String),

    #[error("{}", .0.missing_message())]
    MissingSymbol(GuestSymbol),

    /// The runtime could not be started or the script could not be loaded.
    #[error("{0}")]
    Runtime(String),
}

impl From<GuestException> for GuestFault {
    fn from(exception: GuestException) -> Self {
        GuestFault::Exception(exception)
    }
}

/// A running guest runtime with the library loaded and an `MMData` instance
/// constructed.
pub trait GuestSession: Sized {
    type Data: DataModel;

    /// Boots the runtime and loads the script at `script_path` in library mode.
    ///
    /// Anything acquired before a failure is released before this returns.
    fn start(script_path: &Path, settings: &Settings) -> GuestResult<Self>;

    /// Takes the exception left pending in the runtime, if any, and clears it.
    fn pending_exception(&self) -> Option<GuestException>;

    /// `constants.get_version_and_date()`, stringified.
    fn version_and_date(&self) -> GuestResult<String>;

    /// `constants.mmfmt`.
    fn format_version(&self) -> GuestResult<u64>;

    fn data(&self) -> &Self::Data;

    /// Releases the data model, both environments and the runtime, in that order.
    fn shutdown(self) {
        drop(self);
    }
}

/// The long-lived `MMData` instance: loaded ROM plus applied hack.
///
/// Boolean results carry the guest's truthiness; `false` means the call
/// failed without raising and `errors_string` should say why.
pub trait DataModel {
    type World: World;

    fn read(&self, path: &str) -> GuestResult<bool>;
    fn parse(&self, path: &str) -> GuestResult<bool>;
    fn write(&self, path: &str) -> GuestResult<bool>;
    fn stat(&self, path: &str, overwrite_all: bool) -> GuestResult<bool>;
    fn serialize_json_str(&self, selector: &str) -> GuestResult<String>;
    fn deserialize_json_str(&self, json: &str) -> GuestResult<bool>;

    /// Accumulated domain errors, `None` when there are none.
    fn errors_string(&self) -> GuestResult<Option<String>>;

    fn world_count(&self) -> GuestResult<usize>;

    /// `None` when `idx` is past the end of `worlds`.
    fn world(&self, idx: usize) -> GuestResult<Option<Self::World>>;
}

pub trait World {
    /// Raw guest result; negative values are the guest's failure sentinel.
    fn mirror_tile(&self, tile: TileIndex) -> GuestResult<i64>;
}
