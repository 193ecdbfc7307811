//! Bridge settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Initial verbosity threshold, see [`crate::log`].
    pub log_level: i32,
    pub runtime: RuntimeSettings,
}

/// Knobs handed to the guest runtime binding at `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Heap limit in bytes, runtime default when unset.
    pub memory_limit: Option<usize>,
    /// Interpreter stack limit in bytes.
    pub max_stack_size: Option<usize>,
    /// Import the diagnostic formatter so exceptions carry a trace.
    pub decode_exceptions: bool,
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: crate::log::LOG_ERROR,
            runtime: RuntimeSettings::default(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_stack_size: None,
            decode_exceptions: true,
        }
    }
}
