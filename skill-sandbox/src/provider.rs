//! Provider and session traits implemented by sandbox backends.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skill_primitives::Language;

use crate::error::SandboxResult;

/// Captured outcome of running code in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Process exit code; `0` means success.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RunOutput {
    /// Returns `true` when the code exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A live, stateful execution environment.
///
/// The pool never runs two calls on one session at the same time for the
/// same caller, but sessions must still be `Send + Sync` to be shared.
#[async_trait]
pub trait SandboxSession: Send + Sync {
    /// Runs `code`, installing `libraries` first when the session lacks them.
    ///
    /// A non-zero exit code is a successful run with a failing [`RunOutput`];
    /// errors are reserved for the session itself misbehaving.
    async fn run(
        &self,
        code: &str,
        libraries: &[String],
        timeout: Duration,
    ) -> SandboxResult<RunOutput>;

    /// Releases the session. Closing twice must be harmless.
    async fn close(&self) -> SandboxResult<()>;
}

/// Opens sessions for a language.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Opens a fresh session.
    async fn open(&self, language: Language) -> SandboxResult<Box<dyn SandboxSession>>;
}
