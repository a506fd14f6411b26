//! Tool registration, deadline-bounded invocation and change notification.
//!
//! A [`ToolRegistry`](registry::ToolRegistry) maps tool names to schemas and
//! invokers. Every invocation runs on its own task under a deadline and always
//! yields a [`ToolOutput`](registry::ToolOutput): failures come back as
//! structured values, never as errors, so a misbehaving tool cannot take down
//! the caller. [`ToolEvents`](events::ToolEvents) keeps independent registries
//! consistent when skills are created or removed.

#![warn(missing_docs, clippy::pedantic)]

pub mod deadline;
pub mod error;
pub mod events;
pub mod registry;
pub mod tool;

pub use deadline::{DeadlineConfig, DeadlineExecutor};
pub use error::{FailureKind, ToolError, ToolFailure, ToolResult};
pub use events::{ChangeKind, SubscriberResult, ToolChangeEvent, ToolEvents};
pub use registry::{RegisteredTool, ToolOutput, ToolRegistry};
pub use tool::{Invoker, Tool};
