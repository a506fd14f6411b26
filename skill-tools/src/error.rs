//! Tool errors and their serializable form.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use skill_schema::SchemaError;
use thiserror::Error;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors produced by tool registration and invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The tool's signature could not be turned into a schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },

    /// The tool ran and failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Failure reported by the tool or its runtime.
        reason: String,
    },

    /// The tool did not finish before its deadline.
    #[error("tool did not finish within {}s", bound.as_secs_f64())]
    TimeoutExceeded {
        /// The deadline that elapsed.
        bound: Duration,
    },

    /// An isolated session could not be opened or prepared.
    #[error("isolation setup failed: {reason}")]
    IsolationSetup {
        /// Reason reported by the sandbox layer.
        reason: String,
    },

    /// Arguments or results could not be represented as JSON.
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Underlying serializer message.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates an isolation setup error.
    #[must_use]
    pub fn isolation(reason: impl Into<String>) -> Self {
        Self::IsolationSetup {
            reason: reason.into(),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Schema(_) => FailureKind::Schema,
            Self::UnknownTool { .. } => FailureKind::UnknownTool,
            Self::Execution { .. } => FailureKind::Execution,
            Self::TimeoutExceeded { .. } => FailureKind::TimeoutExceeded,
            Self::IsolationSetup { .. } => FailureKind::IsolationSetup,
            Self::Serialization { .. } => FailureKind::Serialization,
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Category of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Schema generation failed.
    Schema,
    /// No such tool.
    UnknownTool,
    /// The tool raised an error.
    Execution,
    /// The deadline elapsed.
    TimeoutExceeded,
    /// Sandbox session setup failed.
    IsolationSetup,
    /// JSON conversion failed.
    Serialization,
}

/// Structured error result handed back to callers instead of an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Tool that was invoked.
    pub tool: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl ToolFailure {
    /// Builds the failure record for `error` raised by `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool: tool.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
