//! Shared error definitions for runtime primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the runtime primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided identifier could not be parsed.
    #[error("invalid identifier: {source}")]
    InvalidId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Skill name failed validation.
    #[error("invalid skill name `{name}`: {reason}")]
    InvalidSkillName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Language tag was not recognised.
    #[error("unsupported language `{0}`")]
    UnsupportedLanguage(String),
}
