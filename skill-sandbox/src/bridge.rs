//! Running async pool operations from synchronous code.
//!
//! Skills are plain functions, so a sandboxed call made from synchronous
//! context has no runtime to await on. [`block_on`] drives the future to
//! completion whether or not the caller is already inside a Tokio runtime.

use std::future::Future;

use tokio::runtime::{Builder, Handle};

use crate::error::{SandboxError, SandboxResult};

/// Drives `future` to completion from synchronous code.
///
/// Outside a runtime a private current-thread runtime is built on the calling
/// thread. Inside one, blocking the runtime's own worker would deadlock, so the
/// future runs on a scoped helper thread with its own runtime instead.
///
/// # Errors
///
/// Returns [`SandboxError::Io`] when a runtime cannot be built and
/// [`SandboxError::BridgePanicked`] when the helper thread panics.
pub fn block_on<F>(future: F) -> SandboxResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return run_local(future);
    }

    std::thread::scope(|scope| {
        scope
            .spawn(|| run_local(future))
            .join()
            .map_err(|_| SandboxError::BridgePanicked)?
    })
}

fn run_local<F: Future>(future: F) -> SandboxResult<F::Output> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
