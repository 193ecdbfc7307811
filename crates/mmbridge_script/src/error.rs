use std::path::PathBuf;

use thiserror::Error;

/// Failures while bringing the runtime up, before any guest code runs.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("quickjs: {0}")]
    QuickJs(#[from] rquickjs::Error),

    #[error("unable to read guest script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
