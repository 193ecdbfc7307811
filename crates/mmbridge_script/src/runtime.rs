//! Script runtime management
//!
//! One QuickJS runtime with a single full context per guest session.

use mmbridge_core::RuntimeSettings;
use rquickjs::{Context, Runtime};

use crate::error::ScriptError;

/// Script execution context
pub struct ScriptRuntime {
    pub context: Context,
    runtime: Runtime,
}

impl ScriptRuntime {
    pub fn new(settings: &RuntimeSettings) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        if let Some(limit) = settings.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = settings.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        let context = Context::full(&runtime)?;

        Ok(Self { context, runtime })
    }

    /// Collects garbage and frees the runtime.
    ///
    /// Every persistent handle into this runtime must already be dropped.
    pub fn shutdown(self) {
        self.runtime.run_gc();
        drop(self.context);
        drop(self.runtime);
        tracing::debug!("guest runtime shut down");
    }
}
