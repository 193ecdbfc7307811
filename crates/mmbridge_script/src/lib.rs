//! MMagEdit Bridge Scripting Layer
//!
//! Runs the MMagEdit guest library inside QuickJS and implements the
//! `mmbridge_core` guest interfaces on top of it.
//!
//! ## Guest contract
//!
//! - The script sees `scriptArgs == [script_path, "--as-lib"]`.
//! - It publishes `constants`, `util` and the `MMData` class on
//!   `module.exports` (also reachable as `exports`).
//! - Exceptions never cross the boundary: each one is trapped, formatted
//!   with the bundled `traceback.js` module when available, and cleared.

mod error;
mod exception;
mod handle;
pub mod runtime;
pub mod session;

pub use error::ScriptError;
pub use session::{QuickJsData, QuickJsSession, QuickJsWorld};

pub use rquickjs;
