//! Error types for skill loading and lifecycle operations.

use std::path::PathBuf;

use skill_scanner::ScanError;
use thiserror::Error;

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors surfaced while loading, creating or removing skills.
#[derive(Debug, Error)]
pub enum HostError {
    /// The skill name failed validation.
    #[error(transparent)]
    InvalidName(#[from] skill_primitives::Error),

    /// Skill source could not be parsed.
    #[error("skill `{skill}` failed to scan: {source}")]
    Scan {
        /// Skill being scanned.
        skill: String,
        /// Scanner failure.
        #[source]
        source: ScanError,
    },

    /// A skill with this name already exists.
    #[error("skill `{0}` already exists")]
    AlreadyExists(String),

    /// No skill with this name exists.
    #[error("skill `{0}` not found")]
    NotFound(String),

    /// Filesystem access failed.
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
