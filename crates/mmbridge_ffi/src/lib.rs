//! MMagEdit Bridge C ABI
//!
//! The boundary functions declared in `include/mmagedit.h`. This is the only
//! place sentinels exist: failures come back as a nonzero code, `"null"`,
//! `""`, `0` or `-1`, and the explanation waits in the error latch.
//!
//! One process-wide [`Bridge`] behind a mutex. Hosts serialize their calls
//! but may make them from any thread; returned strings live in one slot
//! until the next string-returning call.

use std::ffi::{c_char, c_int, CStr, CString};
use std::sync::{Mutex, PoisonError};

use mmbridge_core::{Bridge, BridgeError, BridgeResult};
use mmbridge_script::QuickJsSession;
use once_cell::sync::Lazy;

pub type ErrorCode = c_int;

pub const MMAGEDIT_OK: ErrorCode = 0;
pub const MMAGEDIT_FAILURE: ErrorCode = 1;

const NULL_JSON: &str = "null";
const HELLO_WORLD: &[u8] = b"Hello, World!\0";

/// Everything the C ABI keeps between calls.
struct Boundary {
    bridge: Bridge<QuickJsSession>,
    string_out: CString,
    hello_world_int: c_int,
}

impl Boundary {
    fn new() -> Self {
        Self {
            bridge: Bridge::new(),
            string_out: CString::default(),
            hello_world_int: 0,
        }
    }

    /// Keeps `text` alive until the next string-returning call.
    fn store(&mut self, text: &str) -> *const c_char {
        self.string_out = CString::new(text).unwrap_or_else(|err| {
            let mut bytes = err.into_vec();
            bytes.retain(|&byte| byte != 0);
            CString::new(bytes).unwrap_or_default()
        });
        self.string_out.as_ptr()
    }

    fn json_out(&mut self, result: BridgeResult<String>) -> *const c_char {
        match result {
            Ok(json) => self.store(&json),
            Err(_) => self.store(NULL_JSON),
        }
    }

    /// Converts a string argument, latching the failure if it is unusable.
    unsafe fn with_str_arg<T>(
        &mut self,
        ptr: *const c_char,
        op: impl FnOnce(&mut Bridge<QuickJsSession>, &str) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        match host_str(ptr) {
            Ok(text) => op(&mut self.bridge, text),
            Err(err) => self.bridge.reject(err),
        }
    }
}

static BOUNDARY: Lazy<Mutex<Boundary>> = Lazy::new(|| Mutex::new(Boundary::new()));

/// Routes error events to stderr and everything else to stdout, unless the
/// host already installed a subscriber.
static LOGGING: Lazy<()> = Lazy::new(|| {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let writer = std::io::stderr
        .with_max_level(tracing::Level::ERROR)
        .or_else(std::io::stdout);
    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .without_time()
        .try_init();
});

fn install_logging() {
    Lazy::force(&LOGGING);
}

fn with_boundary<R>(f: impl FnOnce(&mut Boundary) -> R) -> R {
    let mut boundary = BOUNDARY.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut boundary)
}

fn with_bridge<R>(f: impl FnOnce(&mut Bridge<QuickJsSession>) -> R) -> R {
    with_boundary(|boundary| f(&mut boundary.bridge))
}

unsafe fn host_str<'a>(ptr: *const c_char) -> BridgeResult<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::Marshal("null string argument".to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BridgeError::Marshal("unable to construct guest string".to_string()))
}

/// Runs `op` on a string argument under the boundary lock.
unsafe fn with_str_arg<T>(
    ptr: *const c_char,
    op: impl FnOnce(&mut Bridge<QuickJsSession>, &str) -> BridgeResult<T>,
) -> BridgeResult<T> {
    with_boundary(|boundary| boundary.with_str_arg(ptr, op))
}

fn code(result: BridgeResult<()>) -> ErrorCode {
    match result {
        Ok(()) => MMAGEDIT_OK,
        Err(_) => MMAGEDIT_FAILURE,
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// # Safety
/// `path_to_mmagedit` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_init(path_to_mmagedit: *const c_char) -> ErrorCode {
    install_logging();
    code(with_str_arg(path_to_mmagedit, |bridge, path| bridge.init(path)))
}

#[no_mangle]
pub extern "C" fn mmagedit_end() -> ErrorCode {
    code(with_bridge(|bridge| bridge.end()))
}

// ============================================================================
// Error latch and logging
// ============================================================================

/// Returns the latched error and clears it.
#[no_mangle]
pub extern "C" fn mmagedit_get_error() -> *const c_char {
    with_boundary(|boundary| {
        let message = boundary.bridge.take_error();
        boundary.store(&message)
    })
}

#[no_mangle]
pub extern "C" fn mmagedit_clear_error() {
    with_bridge(|bridge| bridge.clear_error());
}

#[no_mangle]
pub extern "C" fn mmagedit_get_error_occurred() -> c_int {
    c_int::from(with_bridge(|bridge| bridge.error_occurred()))
}

#[no_mangle]
pub extern "C" fn mmagedit_set_log_level(level: c_int) {
    install_logging();
    with_bridge(|bridge| bridge.set_log_level(level));
}

// ============================================================================
// Metadata
// ============================================================================

#[no_mangle]
pub extern "C" fn mmagedit_get_name_version_date() -> *const c_char {
    with_boundary(|boundary| {
        let name = boundary.bridge.name_version_date().unwrap_or_default();
        boundary.store(&name)
    })
}

#[no_mangle]
pub extern "C" fn mmagedit_get_version_int() -> u64 {
    with_bridge(|bridge| bridge.version_int()).unwrap_or(0)
}

// ============================================================================
// ROM and hack files
// ============================================================================

/// # Safety
/// `path_to_rom` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_load_rom(path_to_rom: *const c_char) -> ErrorCode {
    code(with_str_arg(path_to_rom, |bridge, path| bridge.load_rom(path)))
}

/// # Safety
/// `path_to_hack` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_load_hack(path_to_hack: *const c_char) -> ErrorCode {
    code(with_str_arg(path_to_hack, |bridge, path| bridge.load_hack(path)))
}

/// # Safety
/// `path_to_rom` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_write_rom(path_to_rom: *const c_char) -> ErrorCode {
    code(with_str_arg(path_to_rom, |bridge, path| bridge.write_rom(path)))
}

/// # Safety
/// `path_to_hack` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_write_hack(
    path_to_hack: *const c_char,
    overwrite_all: bool,
) -> ErrorCode {
    code(with_str_arg(path_to_hack, |bridge, path| {
        bridge.write_hack(path, overwrite_all)
    }))
}

// ============================================================================
// JSON state
// ============================================================================

/// Full state as JSON, or `"null"` on failure.
#[no_mangle]
pub extern "C" fn mmagedit_get_state() -> *const c_char {
    with_boundary(|boundary| {
        let state = boundary.bridge.get_state();
        boundary.json_out(state)
    })
}

/// # Safety
/// `selector` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_get_state_select(selector: *const c_char) -> *const c_char {
    with_boundary(|boundary| {
        let state = boundary.with_str_arg(selector, |bridge, selector| {
            bridge.get_state_select(selector)
        });
        boundary.json_out(state)
    })
}

/// # Safety
/// `json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmagedit_apply_state(json: *const c_char) -> ErrorCode {
    code(with_str_arg(json, |bridge, json| bridge.apply_state(json)))
}

// ============================================================================
// Worlds
// ============================================================================

/// Mirrored medtile index, or `-1` on failure.
#[no_mangle]
pub extern "C" fn mmagedit_get_mirror_tile_idx(world_idx: c_int, tile_idx: c_int) -> c_int {
    with_bridge(|bridge| bridge.mirror_tile_idx(world_idx, tile_idx)).unwrap_or(-1)
}

// ============================================================================
// ABI smoke test
// ============================================================================

#[no_mangle]
pub extern "C" fn mmagedit_hw_set_int(value: c_int) {
    with_boundary(|boundary| boundary.hello_world_int = value);
}

#[no_mangle]
pub extern "C" fn mmagedit_hw_get_int() -> c_int {
    with_boundary(|boundary| boundary.hello_world_int)
}

#[no_mangle]
pub extern "C" fn mmagedit_hw_get_str() -> *const c_char {
    HELLO_WORLD.as_ptr().cast()
}
