//! Harness-level errors.

use emodkit_kernel::KernelError;
use thiserror::Error;

use crate::bundle::BundleError;
use crate::bundle_dir::RunDirError;
use crate::task::TaskStage;

pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Lifecycle stages only move forward.
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: TaskStage, to: TaskStage },

    /// Common scope was frozen by the first `copy_simulation`.
    #[error("common scope is read-only once a simulation has been copied from it")]
    CommonScopeFrozen,

    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("run directory error: {0}")]
    RunDir(#[from] RunDirError),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
