//! Error types for sandbox sessions and the pool.

use std::time::Duration;

use thiserror::Error;

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors produced by providers, sessions and the pool.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// A session could not be opened for the key.
    #[error("failed to set up sandbox session `{key}`: {reason}")]
    Setup {
        /// Session key, rendered as `<skill>_<language>`.
        key: String,
        /// Reason reported by the provider.
        reason: String,
    },

    /// The session failed to run code (not the code failing by itself).
    #[error("sandbox session `{key}` failed to run code: {reason}")]
    Execution {
        /// Session key.
        key: String,
        /// Reason reported by the session.
        reason: String,
    },

    /// Code did not finish in time.
    #[error("sandbox execution exceeded {}s", bound.as_secs_f64())]
    Timeout {
        /// The deadline that elapsed.
        bound: Duration,
    },

    /// Provider-level failure.
    #[error("sandbox provider error: {0}")]
    Provider(String),

    /// The session was already closed.
    #[error("sandbox session is closed")]
    Closed,

    /// Local I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The worker thread used to bridge into async code panicked.
    #[error("sandbox bridge thread panicked")]
    BridgePanicked,
}

impl SandboxError {
    /// Creates a provider error.
    #[must_use]
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider(reason.into())
    }

    /// Returns `true` when the failure happened while preparing a session.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(self, Self::Setup { .. })
    }
}
