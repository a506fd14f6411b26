//! Shape-driven chunking strategies.

use std::fmt::Debug;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ChunkerConfig;
use crate::result::{Chunk, ChunkStrategy, ChunkedResult};
use crate::text::{split_text, truncate};

/// Serialized size of a JSON value, in characters.
#[must_use]
pub fn serialized_len(value: &Value) -> usize {
    value.to_string().chars().count()
}

/// Outcome of passing a result through the chunker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChunkOutcome {
    /// The result fit the budget and is returned as-is.
    Unchanged(Value),
    /// The result was split and capped.
    Chunked(ChunkedResult),
}

impl ChunkOutcome {
    /// Returns `true` when the result was split.
    #[must_use]
    pub const fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked(_))
    }

    /// Returns the chunked envelope, if any.
    #[must_use]
    pub fn as_chunked(&self) -> Option<&ChunkedResult> {
        match self {
            Self::Chunked(chunked) => Some(chunked),
            Self::Unchanged(_) => None,
        }
    }
}

/// Splits oversized results into a bounded set of labeled chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultChunker {
    config: ChunkerConfig,
}

impl ResultChunker {
    /// Creates a chunker with the given configuration.
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunks `result` against the configured maximum size.
    #[must_use]
    pub fn process(&self, result: &Value) -> ChunkOutcome {
        self.chunk(result, self.config.max_result_size())
    }

    /// Chunks any serializable value.
    ///
    /// A value that cannot be represented as JSON is replaced by a truncated
    /// string rendering of its debug form instead of failing.
    #[must_use]
    pub fn process_serializable<T>(&self, result: &T) -> ChunkOutcome
    where
        T: Serialize + Debug + ?Sized,
    {
        match serde_json::to_value(result) {
            Ok(value) => self.process(&value),
            Err(err) => {
                warn!(error = %err, "result not serializable; substituting its debug rendering");
                let rendered = format!("{result:?}");
                let fallback = truncate(&rendered, self.config.max_result_size());
                self.process(&Value::String(fallback.to_owned()))
            }
        }
    }

    /// Chunks `result` if its serialized size exceeds `max_size`.
    ///
    /// Results within the limit are returned unchanged.
    #[must_use]
    pub fn chunk(&self, result: &Value, max_size: usize) -> ChunkOutcome {
        let original_size = serialized_len(result);
        if original_size <= max_size {
            return ChunkOutcome::Unchanged(result.clone());
        }

        let chunked = match result {
            Value::Object(fields) => self.by_field(fields, original_size),
            Value::Array(items) => self.by_item(items, original_size),
            Value::String(text) => self.by_text(text, original_size),
            other => self.by_text(&other.to_string(), original_size),
        };
        debug!(
            original_size,
            strategy = ?chunked.strategy,
            total_chunks = chunked.total_chunks,
            remaining = chunked.remaining_chunks,
            "chunked oversized result"
        );
        ChunkOutcome::Chunked(chunked.finish())
    }

    fn by_field(&self, fields: &Map<String, Value>, original_size: usize) -> ChunkedResult {
        let threshold = self.config.field_threshold();
        let (large, small): (Vec<_>, Vec<_>) = fields
            .iter()
            .partition(|(_, value)| serialized_len(value) >= threshold);

        if large.is_empty() {
            // Many small fields: nothing to split individually.
            let text = Value::Object(fields.clone()).to_string();
            return self.by_text(&text, original_size);
        }

        let mut result = ChunkedResult::new(original_size, ChunkStrategy::ByField);
        result.metadata = Some(
            small
                .into_iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        );
        for (name, value) in large {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let chunks = self.text_chunks(&text, Some(name));
            result.push_capped(chunks, self.config.max_chunks());
        }
        result
    }

    fn by_item(&self, items: &[Value], original_size: usize) -> ChunkedResult {
        let budget = self.config.chunk_size();
        let mut groups: Vec<Vec<Value>> = Vec::new();
        let mut current = Vec::new();
        let mut current_size = 0;

        for item in items {
            let size = serialized_len(item);
            if !current.is_empty() && current_size + size > budget {
                groups.push(std::mem::take(&mut current));
                current_size = 0;
            }
            current_size += size;
            current.push(item.clone());
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let total = groups.len();
        let chunks = groups
            .into_iter()
            .enumerate()
            .map(|(position, group)| {
                let item_count = group.len();
                let payload = Value::Array(group);
                Chunk {
                    index: position + 1,
                    total,
                    field: None,
                    size: serialized_len(&payload),
                    payload,
                    item_count: Some(item_count),
                }
            })
            .collect();

        let mut result = ChunkedResult::new(original_size, ChunkStrategy::ByItem);
        result.total_items = Some(items.len());
        result.push_capped(chunks, self.config.max_chunks());
        result
    }

    fn by_text(&self, text: &str, original_size: usize) -> ChunkedResult {
        let mut result = ChunkedResult::new(original_size, ChunkStrategy::ByTextSpan);
        result.total_length = Some(text.chars().count());
        result.push_capped(self.text_chunks(text, None), self.config.max_chunks());
        result
    }

    fn text_chunks(&self, text: &str, field: Option<&String>) -> Vec<Chunk> {
        let spans = split_text(
            text,
            self.config.chunk_size(),
            self.config.sentence_window(),
        );
        let total = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(position, span)| Chunk {
                index: position + 1,
                total,
                field: field.cloned(),
                payload: Value::String(span.to_owned()),
                size: span.chars().count(),
                item_count: None,
            })
            .collect()
    }
}
