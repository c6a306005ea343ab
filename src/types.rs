//! Core data model shared by the embedding, store and migration layers.

use serde::{Deserialize, Serialize};

/// Maximum number of characters of chunk content persisted as record metadata.
///
/// Hosted indexes cap metadata size per vector; anything beyond this is cut
/// and the record is flagged via [`RecordMetadata::truncated`].
pub const MAX_METADATA_CONTENT_CHARS: usize = 40_000;

/// Byte limit on one record's metadata once serialized as JSON.
pub const MAX_METADATA_BYTES: usize = 40_960;

/// Serialized size of every metadata field except `content` and `source`,
/// with the widest possible `chunk_index`.
const METADATA_FRAME_BYTES: usize = 96;

/// Dense embedding vector.
pub type Embedding = Vec<f32>;

/// A chunk of document text ready for embedding.
///
/// Produced by the text-loading collaborator or by the legacy store reader.
/// Fields are private so a chunk cannot be mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    content: String,
    source: String,
    chunk_index: u64,
    collection: String,
}

impl DocumentChunk {
    /// Create a new chunk.
    pub fn new(
        content: impl Into<String>,
        source: impl Into<String>,
        chunk_index: u64,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            chunk_index,
            collection: collection.into(),
        }
    }

    /// Consume the chunk and return the same content labelled for another collection.
    #[must_use]
    pub fn into_collection(self, collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..self
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// True when the content has no non-whitespace characters.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Metadata persisted alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Chunk content, cut to [`MAX_METADATA_CONTENT_CHARS`] and to whatever
    /// fits in [`MAX_METADATA_BYTES`].
    pub content: String,
    /// Original source path or identifier.
    pub source: String,
    /// Position of the chunk within its source.
    pub chunk_index: u64,
    /// Set when `content` lost characters to the metadata size limit.
    #[serde(default)]
    pub truncated: bool,
}

/// A vector plus its stable identifier and metadata, as written to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Embedding,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Build the record for `chunk` inside `namespace`.
    ///
    /// The id is `{namespace}_{source_basename}_{chunk_index}`, so re-running
    /// ingestion for the same chunk overwrites instead of duplicating.
    pub fn from_chunk(namespace: &str, chunk: &DocumentChunk, values: Embedding) -> Self {
        let budget =
            MAX_METADATA_BYTES.saturating_sub(METADATA_FRAME_BYTES + json_len(chunk.source()));
        let (content, truncated) =
            truncate_metadata_content(chunk.content(), MAX_METADATA_CONTENT_CHARS, budget);
        let id = record_id(namespace, chunk.source(), chunk.chunk_index());
        if truncated {
            tracing::debug!(
                target: "store",
                "record {id} content truncated to {} of {} bytes",
                content.len(),
                chunk.content().len()
            );
        }
        Self {
            id,
            values,
            metadata: RecordMetadata {
                content: content.to_string(),
                source: chunk.source().to_string(),
                chunk_index: chunk.chunk_index(),
                truncated,
            },
        }
    }
}

/// A ranked hit returned from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub content: String,
    pub source: String,
    pub chunk_index: u64,
    pub score: f32,
}

/// Deterministic record id for a chunk.
pub fn record_id(namespace: &str, source: &str, chunk_index: u64) -> String {
    format!("{namespace}_{}_{chunk_index}", source_basename(source))
}

/// Final path component of `source`, accepting both `/` and `\` separators.
pub fn source_basename(source: &str) -> &str {
    source
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(source)
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
///
/// Returns the kept prefix and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Cut `text` so it keeps at most `max_chars` characters and its JSON string
/// encoding (escapes included, quotes excluded) stays within `max_json_bytes`.
///
/// Cuts only on character boundaries. Returns the kept prefix and whether
/// anything was dropped.
pub fn truncate_metadata_content(
    text: &str,
    max_chars: usize,
    max_json_bytes: usize,
) -> (&str, bool) {
    let mut used = 0;
    for (count, (byte_idx, c)) in text.char_indices().enumerate() {
        used += json_escaped_len(c);
        if count >= max_chars || used > max_json_bytes {
            return (&text[..byte_idx], true);
        }
    }
    (text, false)
}

fn json_len(text: &str) -> usize {
    text.chars().map(json_escaped_len).sum()
}

/// Bytes `c` occupies inside a JSON string as `serde_json` writes it.
fn json_escaped_len(c: char) -> usize {
    match c {
        '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0c}' => 2,
        c if (c as u32) < 0x20 => 6,
        c => c.len_utf8(),
    }
}
