//! Chunker configuration.

use std::num::NonZeroUsize;

use crate::error::{ChunkError, ChunkResult};

/// Size budgets and caps applied by [`ResultChunker`](crate::ResultChunker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    max_result_size: NonZeroUsize,
    chunk_size: NonZeroUsize,
    field_threshold: NonZeroUsize,
    max_chunks: NonZeroUsize,
    sentence_window: usize,
}

impl ChunkerConfig {
    /// Creates a configuration with the given overall and per-chunk budgets.
    ///
    /// The field threshold defaults to the chunk size, the chunk cap to 2 and
    /// the sentence search window to 2000 characters.
    #[must_use]
    pub const fn new(max_result_size: NonZeroUsize, chunk_size: NonZeroUsize) -> Self {
        Self {
            max_result_size,
            chunk_size,
            field_threshold: chunk_size,
            max_chunks: NonZeroUsize::MIN.saturating_add(1),
            sentence_window: 2000,
        }
    }

    /// Builds a configuration from raw values.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidConfig`] naming the first budget or cap
    /// that is zero. A zero sentence window is allowed and disables the
    /// sentence boundary search.
    pub fn from_limits(
        max_result_size: usize,
        chunk_size: usize,
        field_threshold: usize,
        max_chunks: usize,
        sentence_window: usize,
    ) -> ChunkResult<Self> {
        let non_zero = |value: usize, field: &'static str| {
            NonZeroUsize::new(value).ok_or(ChunkError::InvalidConfig { field })
        };
        Ok(Self {
            max_result_size: non_zero(max_result_size, "max_result_size")?,
            chunk_size: non_zero(chunk_size, "chunk_size")?,
            field_threshold: non_zero(field_threshold, "field_threshold")?,
            max_chunks: non_zero(max_chunks, "max_chunks")?,
            sentence_window,
        })
    }

    /// Sets the per-field size at or above which an object field is chunked.
    #[must_use]
    pub const fn with_field_threshold(mut self, field_threshold: NonZeroUsize) -> Self {
        self.field_threshold = field_threshold;
        self
    }

    /// Sets how many chunks are returned per strategy (per field for objects).
    #[must_use]
    pub const fn with_max_chunks(mut self, max_chunks: NonZeroUsize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Sets how far back from a hard cut a sentence boundary is searched for.
    #[must_use]
    pub const fn with_sentence_window(mut self, sentence_window: usize) -> Self {
        self.sentence_window = sentence_window;
        self
    }

    /// Serialized size above which a result is chunked.
    #[must_use]
    pub const fn max_result_size(&self) -> usize {
        self.max_result_size.get()
    }

    /// Budget of a single chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    /// Per-field threshold for object results.
    #[must_use]
    pub const fn field_threshold(&self) -> usize {
        self.field_threshold.get()
    }

    /// Number of chunks returned.
    #[must_use]
    pub const fn max_chunks(&self) -> usize {
        self.max_chunks.get()
    }

    /// Sentence boundary search window.
    #[must_use]
    pub const fn sentence_window(&self) -> usize {
        self.sentence_window
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::from_limits(32_000, 24_000, 24_000, 2, 2_000).expect("non-zero defaults")
    }
}
