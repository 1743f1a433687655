//! Typed kernel errors.
//!
//! All validation is eager: an error is returned by the call that introduced
//! the bad value, and the offending mutation is not applied.

use thiserror::Error;

/// Result alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Failure modes of the composition engine.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Bad file extension, out-of-range value, malformed `key:value` pair,
    /// non-ascending bin list, unknown parameter name.
    #[error("validation error: {0}")]
    Validation(String),

    /// Two entries resolve to the same destination without an explicit override.
    #[error("duplicate asset: {path}")]
    DuplicateAsset { path: String },

    /// A second inline reporter of an already-present class.
    #[error("configuration conflict: reporter {class} is already configured")]
    ConfigurationConflict { class: String },

    /// An operation needed a collaborator that has not been supplied.
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KernelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing(prerequisite: impl Into<String>) -> Self {
        Self::MissingPrerequisite(prerequisite.into())
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
