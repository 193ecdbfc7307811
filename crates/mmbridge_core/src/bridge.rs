//! Data bridge: host operations onto the guest data model
//!
//! Every guest-touching operation follows the same pattern:
//! 1. precheck for an exception left pending by an earlier call
//! 2. invoke the guest method (the binding marshals arguments)
//! 3. a raised exception discards the result and becomes the error
//! 4. a falsy result without exception is explained by `errors_string()`,
//!    or reported as `unknown error`
//! 5. drain anything still pending so it cannot leak into the next call
//!
//! Failures are returned and also written to the error latch, which is what
//! the C boundary reads.

use std::path::Path;

use crate::error::{BridgeError, BridgeResult};
use crate::guest::{DataModel, GuestResult, GuestSession, TileIndex, World, WorldIndex};
use crate::latch::ErrorLatch;
use crate::log::Verbosity;
use crate::settings::Settings;
use crate::MIN_FORMAT_VERSION;

/// One guest session plus the error latch and verbosity threshold.
///
/// Not reentrant and not thread-safe: callers serialize every call,
/// `init`/`end` included. Calling `init` again without `end` replaces the
/// current session; that is caller responsibility and not checked.
pub struct Bridge<S: GuestSession> {
    session: Option<S>,
    latch: ErrorLatch,
    verbosity: Verbosity,
    settings: Settings,
}

impl<S: GuestSession> Bridge<S> {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            session: None,
            latch: ErrorLatch::new(),
            verbosity: Verbosity::new(settings.log_level),
            settings,
        }
    }

    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Error latch and verbosity
    // ------------------------------------------------------------------

    pub fn error_occurred(&self) -> bool {
        self.latch.occurred()
    }

    /// Peek at the latched error without clearing it.
    pub fn error(&self) -> &str {
        self.latch.message()
    }

    pub fn take_error(&mut self) -> String {
        self.latch.take()
    }

    pub fn clear_error(&mut self) {
        self.latch.clear();
    }

    pub fn set_log_level(&mut self, level: i32) {
        self.verbosity.set_threshold(level);
    }

    pub fn log_level(&self) -> i32 {
        self.verbosity.threshold()
    }

    /// Latches a failure found on the host side before any guest call.
    pub fn reject<T>(&mut self, err: BridgeError) -> BridgeResult<T> {
        self.record(Err(err))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn init(&mut self, script_path: impl AsRef<Path>) -> BridgeResult<()> {
        match self.boot(script_path.as_ref()) {
            Ok(session) => {
                if let Some(previous) = self.session.replace(session) {
                    previous.shutdown();
                }
                self.latch.clear();
                Ok(())
            }
            Err(err) => self.reject(err),
        }
    }

    fn boot(&self, script_path: &Path) -> BridgeResult<S> {
        self.verbosity.trivial(format_args!(
            "initializing guest runtime with {}...",
            script_path.display()
        ));
        let session = S::start(script_path, &self.settings)?;
        self.verbosity.trivial("done.");

        let installed = session.format_version()?;
        if installed < MIN_FORMAT_VERSION {
            return Err(BridgeError::FormatTooOld {
                installed,
                required: MIN_FORMAT_VERSION,
            });
        }

        if let Some(exception) = session.pending_exception() {
            return Err(BridgeError::LingeringException(exception));
        }
        Ok(session)
    }

    /// Releases the session. Safe after a failed or missing `init`.
    pub fn end(&mut self) -> BridgeResult<()> {
        if let Some(session) = self.session.take() {
            self.verbosity.trivial("shutting down guest runtime...");
            session.shutdown();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn name_version_date(&mut self) -> BridgeResult<String> {
        self.run(|session| Ok(session.version_and_date()?))
    }

    pub fn version_int(&mut self) -> BridgeResult<u64> {
        self.run(|session| Ok(session.format_version()?))
    }

    // ------------------------------------------------------------------
    // ROM and hack files
    // ------------------------------------------------------------------

    pub fn load_rom(&mut self, path: &str) -> BridgeResult<()> {
        self.run(|session| settle(session.data(), session.data().read(path)))
    }

    pub fn load_hack(&mut self, path: &str) -> BridgeResult<()> {
        self.run(|session| settle(session.data(), session.data().parse(path)))
    }

    pub fn write_rom(&mut self, path: &str) -> BridgeResult<()> {
        self.run(|session| settle(session.data(), session.data().write(path)))
    }

    /// `overwrite_all` re-emits unmodified regions too.
    pub fn write_hack(&mut self, path: &str, overwrite_all: bool) -> BridgeResult<()> {
        self.run(|session| settle(session.data(), session.data().stat(path, overwrite_all)))
    }

    // ------------------------------------------------------------------
    // JSON state
    // ------------------------------------------------------------------

    pub fn get_state(&mut self) -> BridgeResult<String> {
        self.get_state_select("")
    }

    /// The selector is handed to the guest untouched; empty selects everything.
    pub fn get_state_select(&mut self, selector: &str) -> BridgeResult<String> {
        self.run(|session| Ok(session.data().serialize_json_str(selector)?))
    }

    pub fn apply_state(&mut self, json: &str) -> BridgeResult<()> {
        self.run(|session| settle(session.data(), session.data().deserialize_json_str(json)))
    }

    // ------------------------------------------------------------------
    // Worlds
    // ------------------------------------------------------------------

    pub fn mirror_tile_idx(
        &mut self,
        world_idx: WorldIndex,
        tile_idx: TileIndex,
    ) -> BridgeResult<TileIndex> {
        if tile_idx < 0 {
            return self.reject(BridgeError::NegativeTile);
        }
        let Ok(world_idx) = usize::try_from(world_idx) else {
            return self.reject(BridgeError::NoSuchWorld);
        };

        self.run(|session| {
            let data = session.data();
            if world_idx >= data.world_count()? {
                return Err(BridgeError::NoSuchWorld);
            }
            let world = data.world(world_idx)?.ok_or(BridgeError::NoSuchWorld)?;
            let mirrored = world.mirror_tile(tile_idx)?;
            TileIndex::try_from(mirrored)
                .ok()
                .filter(|idx| *idx >= 0)
                .ok_or(BridgeError::InvalidMirrorTile)
        })
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn run<T>(&mut self, op: impl FnOnce(&S) -> BridgeResult<T>) -> BridgeResult<T> {
        let result = match &self.session {
            None => Err(BridgeError::NotInitialized),
            Some(session) => guarded(session, op),
        };
        self.record(result)
    }

    fn record<T>(&mut self, result: BridgeResult<T>) -> BridgeResult<T> {
        if let Err(err) = &result {
            self.verbosity.error(format_args!("mmdata error: {err}"));
            self.latch.set(err.to_string());
        }
        result
    }
}

impl<S: GuestSession> Default for Bridge<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn guarded<S: GuestSession, T>(
    session: &S,
    op: impl FnOnce(&S) -> BridgeResult<T>,
) -> BridgeResult<T> {
    if let Some(exception) = session.pending_exception() {
        return Err(BridgeError::StaleException(exception));
    }
    let result = op(session);
    match (result, session.pending_exception()) {
        (Ok(_), Some(exception)) => Err(BridgeError::LingeringException(exception)),
        (result, _) => result,
    }
}

/// Applies the falsy-result convention to a boolean guest call.
fn settle<D: DataModel>(data: &D, outcome: GuestResult<bool>) -> BridgeResult<()> {
    if outcome? {
        return Ok(());
    }
    match data.errors_string()? {
        Some(description) => Err(BridgeError::Domain(description)),
        None => Err(BridgeError::Unknown),
    }
}
