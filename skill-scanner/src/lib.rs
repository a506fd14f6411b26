//! Static discovery of tool functions in skill source files.
//!
//! Skills are Rust source files whose entry points carry the `#[tool]` marker
//! (or `#[tool(sandboxed)]` when they must run in an isolated session). The
//! scanner parses the file with `syn` and never compiles, links or runs it, so
//! a skill can be discovered even when its dependencies are unavailable.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod marker;
mod metadata;
mod scan;
mod types;

pub use error::{ScanError, ScanResult};
pub use marker::ToolMarker;
pub use metadata::{ScannedParam, SkillFunctionMetadata};
pub use scan::{ScanReport, ScanWarning, scan_file, scan_source};
pub use types::map_type;
