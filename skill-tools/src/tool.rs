//! Tool implementations and the invoker handle stored by the registry.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolResult;

/// Trait implemented by asynchronous tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given JSON arguments, returning JSON output.
    async fn invoke(&self, input: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        (self)(input).await
    }
}

type BlockingFn = dyn Fn(Value) -> ToolResult<Value> + Send + Sync;

/// How a registered tool is called.
#[derive(Clone)]
pub enum Invoker {
    /// Runs as a task on the async runtime.
    Async(Arc<dyn Tool>),
    /// Runs on the blocking thread pool; for synchronous or CPU-bound code.
    Blocking(Arc<BlockingFn>),
}

impl Invoker {
    /// Wraps an asynchronous tool.
    pub fn from_tool<T>(tool: T) -> Self
    where
        T: Tool + 'static,
    {
        Self::Async(Arc::new(tool))
    }

    /// Wraps a synchronous function.
    pub fn blocking<F>(function: F) -> Self
    where
        F: Fn(Value) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(function))
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async(_) => f.write_str("Invoker::Async"),
            Self::Blocking(_) => f.write_str("Invoker::Blocking"),
        }
    }
}
