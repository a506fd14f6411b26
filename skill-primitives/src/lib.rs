//! Core shared types for the skill runtime.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod language;
mod skill_name;

/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Identifiers for tool registries and sandbox sessions.
pub use ids::{RegistryId, SessionId};
/// Languages a sandbox session can execute.
pub use language::Language;
/// Validated skill directory name.
pub use skill_name::SkillName;
