//! Error types for the chunker.

use thiserror::Error;

/// Result alias for chunker operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors produced while configuring the chunker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// A size budget or cap was zero.
    #[error("chunker setting `{field}` must be greater than zero")]
    InvalidConfig {
        /// Name of the offending setting.
        field: &'static str,
    },
}
