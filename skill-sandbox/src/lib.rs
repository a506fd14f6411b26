//! Reusable isolated execution sessions.
//!
//! A [`SandboxPool`] keeps at most one live session per `(skill, language)`
//! key. Sessions are opened through a [`SandboxProvider`], prepared with the
//! libraries a skill needs, reused until they reach their time-to-live and
//! evicted oldest-first when the pool is full. The container or VM technology
//! behind a provider is not this crate's concern; [`LocalProcessProvider`]
//! runs code as plain child processes and offers no isolation.

#![warn(missing_docs, clippy::pedantic)]

pub mod bridge;
mod error;
mod pool;
mod preload;
mod process;
mod provider;

pub use error::{SandboxError, SandboxResult};
pub use pool::{ExecutionOutput, PoolConfig, PoolStats, SandboxPool, SessionKey, SessionStats};
pub use preload::{is_builtin_module, preload_code, standard_libraries};
pub use process::LocalProcessProvider;
pub use provider::{RunOutput, SandboxProvider, SandboxSession};
