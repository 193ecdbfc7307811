//! MMagEdit Bridge Core
//!
//! Host-side half of the bridge between a host application and the
//! MMagEdit guest library running inside an embedded script runtime:
//! - Error latch (single slot, read clears)
//! - Guest interfaces (session, data model, worlds)
//! - Data bridge operations with exception pre/post checks
//! - Verbosity threshold and settings
//!
//! The runtime binding lives in `mmbridge_script`; the C ABI in `mmbridge_ffi`.

pub mod bridge;
pub mod error;
pub mod guest;
pub mod latch;
pub mod log;
pub mod settings;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use guest::{
    DataModel, GuestException, GuestFault, GuestResult, GuestSession, GuestSymbol, TileIndex,
    World, WorldIndex, LIB_MODE_FLAG,
};
pub use latch::ErrorLatch;
pub use settings::{RuntimeSettings, Settings};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Oldest guest data format (`constants.mmfmt`) the bridge accepts.
pub const MIN_FORMAT_VERSION: u64 = 202103161639;
