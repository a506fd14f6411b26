//! Post-processing for tool results that would overflow a context window.
//!
//! A result whose serialized form fits the configured budget passes through
//! untouched. Larger results are split by shape (object fields, sequence items
//! or text spans) and only the first few chunks are returned, together with the
//! accounting a consumer needs to tell how much was left out.
//!
//! Sizes are counted in characters of serialized JSON.

#![warn(missing_docs, clippy::pedantic)]

mod chunker;
mod config;
mod error;
mod result;
mod text;

pub use chunker::{ChunkOutcome, ResultChunker, serialized_len};
pub use config::ChunkerConfig;
pub use error::{ChunkError, ChunkResult};
pub use result::{Chunk, ChunkStrategy, ChunkedResult};
