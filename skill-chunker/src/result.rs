//! Chunked result records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How an oversized result was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Object fields: small fields kept verbatim, large fields split as text.
    ByField,
    /// Sequence items packed greedily; an item is never split.
    ByItem,
    /// Text split on paragraph, then sentence, then character boundaries.
    ByTextSpan,
}

/// One emitted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based position within its sequence.
    pub index: usize,
    /// Number of chunks in the sequence this chunk belongs to.
    pub total: usize,
    /// Object field the chunk was cut from, for [`ChunkStrategy::ByField`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The chunk content: a text span or an array of items.
    pub payload: Value,
    /// Size of the payload in characters.
    pub size: usize,
    /// Number of items in the payload, for [`ChunkStrategy::ByItem`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

/// An oversized result after splitting and capping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedResult {
    /// Always `true`; lets consumers recognise the envelope.
    pub chunked: bool,
    /// Serialized size of the original result.
    pub original_size: usize,
    /// Strategy that produced the chunks.
    pub strategy: ChunkStrategy,
    /// Emitted chunks, in order.
    pub chunks: Vec<Chunk>,
    /// Number of chunks produced before capping.
    pub total_chunks: usize,
    /// Whether any chunk was omitted.
    pub truncated: bool,
    /// Number of omitted chunks.
    pub remaining_chunks: usize,
    /// Human-readable truncation note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Object fields kept verbatim, for [`ChunkStrategy::ByField`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Number of items in the original sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    /// Character length of the original text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_length: Option<usize>,
}

impl ChunkedResult {
    pub(crate) fn new(original_size: usize, strategy: ChunkStrategy) -> Self {
        Self {
            chunked: true,
            original_size,
            strategy,
            chunks: Vec::new(),
            total_chunks: 0,
            truncated: false,
            remaining_chunks: 0,
            note: None,
            metadata: None,
            total_items: None,
            total_length: None,
        }
    }

    /// Adds a fully split sequence, keeping only its first `cap` chunks.
    pub(crate) fn push_capped(&mut self, chunks: Vec<Chunk>, cap: usize) {
        let total = chunks.len();
        let omitted = total.saturating_sub(cap);
        self.total_chunks += total;
        self.remaining_chunks += omitted;
        self.truncated |= omitted > 0;
        self.chunks.extend(chunks.into_iter().take(cap));
    }

    pub(crate) fn finish(mut self) -> Self {
        if self.truncated {
            self.note = Some(format!(
                "showing {} of {} chunks; {} omitted to stay within the size budget",
                self.chunks.len(),
                self.total_chunks,
                self.remaining_chunks
            ));
        }
        self
    }

    /// Returns the chunks cut from the named object field.
    pub fn field_chunks<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.field.as_deref() == Some(field))
    }
}
