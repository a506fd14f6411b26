//! Deadline-bounded execution of tool calls.
//!
//! Each call runs on its own task and is raced against a timer. When the
//! timer wins, the caller gets [`ToolError::TimeoutExceeded`] immediately and
//! the task is detached: it keeps running until it finishes on its own, since
//! arbitrary tool code cannot be relied upon to cooperate with cancellation.

use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::warn;

use crate::error::{ToolError, ToolResult};
use crate::tool::Invoker;

/// Deadline and concurrency settings.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineConfig {
    default_timeout: Duration,
    max_concurrency: NonZeroUsize,
}

impl DeadlineConfig {
    /// Creates a configuration with the supplied default deadline and
    /// concurrency limit.
    #[must_use]
    pub const fn new(default_timeout: Duration, max_concurrency: NonZeroUsize) -> Self {
        Self {
            default_timeout,
            max_concurrency,
        }
    }

    /// Deadline applied when a tool does not carry its own.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        self.default_timeout
    }

    /// Maximum number of calls running at once.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(30),
            NonZeroUsize::new(32).expect("non-zero"),
        )
    }
}

/// Runs calls on worker tasks and unblocks the caller at the deadline.
#[derive(Debug, Clone)]
pub struct DeadlineExecutor {
    semaphore: Arc<Semaphore>,
    config: DeadlineConfig,
}

impl DeadlineExecutor {
    /// Constructs an executor using the provided configuration.
    #[must_use]
    pub fn new(config: DeadlineConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency().get())),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> DeadlineConfig {
        self.config
    }

    /// Runs `future` to completion or until `timeout` elapses.
    ///
    /// Time spent waiting for a concurrency permit counts against the deadline.
    /// The permit belongs to the waiting caller, so work detached at the
    /// deadline no longer counts against the concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::TimeoutExceeded`] naming `timeout` when the deadline
    /// passes first, [`ToolError::Execution`] when the task panics, or whatever
    /// error the future itself resolves to.
    pub async fn run<F, T>(&self, timeout: Duration, future: F) -> ToolResult<T>
    where
        F: Future<Output = ToolResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let waited = tokio::time::timeout(timeout, async {
            let _permit = self.semaphore.acquire().await.ok();
            tokio::spawn(future).await
        });

        match waited.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(join_failure(err)),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    "call exceeded its deadline; detaching"
                );
                Err(ToolError::TimeoutExceeded { bound: timeout })
            }
        }
    }

    /// Runs a synchronous function on the blocking pool under a deadline.
    ///
    /// # Errors
    ///
    /// Same as [`DeadlineExecutor::run`].
    pub async fn run_blocking<F, T>(&self, timeout: Duration, function: F) -> ToolResult<T>
    where
        F: FnOnce() -> ToolResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(timeout, async move {
            tokio::task::spawn_blocking(function)
                .await
                .map_err(join_failure)?
        })
        .await
    }

    /// Invokes a tool with `input` under the given deadline.
    ///
    /// # Errors
    ///
    /// Same as [`DeadlineExecutor::run`].
    pub async fn invoke(
        &self,
        invoker: &Invoker,
        input: Value,
        timeout: Duration,
    ) -> ToolResult<Value> {
        match invoker {
            Invoker::Async(tool) => {
                let tool = Arc::clone(tool);
                self.run(timeout, async move { tool.invoke(input).await }).await
            }
            Invoker::Blocking(function) => {
                let function = Arc::clone(function);
                self.run_blocking(timeout, move || function(input)).await
            }
        }
    }
}

impl Default for DeadlineExecutor {
    fn default() -> Self {
        Self::new(DeadlineConfig::default())
    }
}

fn join_failure(err: JoinError) -> ToolError {
    if err.is_panic() {
        let payload = err.into_panic();
        ToolError::execution(format!("tool panicked: {}", panic_message(payload.as_ref())))
    } else {
        ToolError::execution("tool task was cancelled")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_within_the_deadline_not_the_call_duration() {
        let executor = DeadlineExecutor::default();
        let deadline = Duration::from_millis(100);
        let started = Instant::now();

        let result = executor
            .run(deadline, async move {
                tokio::time::sleep(deadline * 2).await;
                Ok(1)
            })
            .await;

        assert_eq!(result, Err(ToolError::TimeoutExceeded { bound: deadline }));
        assert!(started.elapsed() < deadline * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_work_keeps_running() {
        let executor = DeadlineExecutor::default();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let result = executor
            .run(Duration::from_millis(10), async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ToolError::TimeoutExceeded { .. })));
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn propagates_tool_errors_and_panics() {
        let executor = DeadlineExecutor::default();
        let err = executor
            .run::<_, ()>(Duration::from_secs(1), async { Err(ToolError::execution("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::execution("boom"));

        let err = executor
            .run_blocking::<_, ()>(Duration::from_secs(1), || panic!("kaboom"))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::execution("tool panicked: kaboom"));
    }

    #[tokio::test]
    async fn invokes_blocking_tools() {
        let executor = DeadlineExecutor::default();
        let invoker =
            Invoker::blocking(|input: Value| Ok(json!(input["n"].as_i64().unwrap_or(0) * 2)));
        let output = executor
            .invoke(&invoker, json!({ "n": 21 }), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output, json!(42));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_calls_release_their_slots() {
        let config = DeadlineConfig::new(Duration::from_secs(1), NonZeroUsize::new(2).unwrap());
        let executor = DeadlineExecutor::new(config);

        for _ in 0..2 {
            let result = executor
                .run(Duration::from_millis(50), async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!("late"))
                })
                .await;
            assert!(matches!(result, Err(ToolError::TimeoutExceeded { .. })));
        }

        let fast = executor
            .run(Duration::from_millis(500), async { Ok(json!("fast")) })
            .await;
        assert_eq!(fast, Ok(json!("fast")));
    }

    #[tokio::test]
    async fn respects_max_concurrency() {
        let config = DeadlineConfig::new(Duration::from_secs(5), NonZeroUsize::new(2).unwrap());
        let executor = DeadlineExecutor::new(config);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut calls = Vec::new();
        for _ in 0..4 {
            let executor = executor.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            calls.push(tokio::spawn(async move {
                executor
                    .run(Duration::from_secs(5), async move {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
    }
}
