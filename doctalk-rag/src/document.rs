//! Data types for documents, chunks, retrieval results and answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key-value metadata attached to loaded sections and chunks.
pub type Metadata = HashMap<String, Value>;

/// A raw record returned by a vector store similarity query.
///
/// Stores are semi-structured, so every field is optional here; the answer
/// agent turns records into [`RetrievedChunk`]s with defaults for missing fields.
pub type SearchRecord = serde_json::Map<String, Value>;

/// Maximum number of characters of chunk text carried in a [`Citation`].
pub const EXCERPT_CHARS: usize = 100;

/// Answer text used when retrieval finds nothing to ground a response in.
pub const NO_RELEVANT_INFORMATION: &str =
    "I could not find any relevant information to answer your question.";

/// A contiguous piece of extracted document text, as produced by a loader.
///
/// Paged formats may yield one section per page; plain text yields one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedSection {
    /// The extracted text.
    pub text: String,
    /// Loader-provided metadata, e.g. `source`.
    pub metadata: Metadata,
}

impl LoadedSection {
    /// Create a section with a `source` metadata entry.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::String(source.into()));
        Self { text: text.into(), metadata }
    }
}

/// A segment of a document with its vector embedding, as persisted by a
/// [`VectorStore`](crate::VectorStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk. Never empty.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Display name of the source document (its file name).
    pub document_name: String,
    /// Identifier generated once per ingestion of the source document.
    pub document_id: String,
    /// Zero-based position of the chunk within its document.
    pub chunk_index: usize,
    /// Metadata inherited from the loaded section.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A chunk returned by similarity search, without its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Store-assigned record identifier.
    pub chunk_id: String,
    pub text: String,
    pub document_name: String,
    pub document_id: String,
    pub chunk_index: usize,
    /// Similarity score; higher is more similar.
    pub score: f32,
    pub metadata: Metadata,
}

impl RetrievedChunk {
    /// Build a retrieved chunk from a raw store record.
    ///
    /// Missing or mistyped fields fall back to defaults instead of failing:
    /// `document_name` becomes `"Unknown"`, `score` becomes `0.0`,
    /// `metadata` becomes empty.
    pub fn from_record(record: &SearchRecord) -> Self {
        let string_field = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_owned);

        Self {
            chunk_id: record.get("_id").map(record_id).unwrap_or_default(),
            text: string_field("text").unwrap_or_default(),
            document_name: string_field("document_name").unwrap_or_else(|| "Unknown".to_string()),
            document_id: string_field("document_id").unwrap_or_default(),
            chunk_index: record
                .get("chunk_index")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
            score: record.get("score").and_then(Value::as_f64).map(|s| s as f32).unwrap_or(0.0),
            metadata: record
                .get("metadata")
                .and_then(Value::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
        }
    }
}

/// Render a store identifier as a string. Handles plain strings, numbers and
/// extended-JSON object ids (`{"$oid": "..."}`).
fn record_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

/// A reference from an answer back to the chunk that supports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub chunk_id: String,
    pub document_name: String,
    /// The first [`EXCERPT_CHARS`] characters of the chunk text, followed by
    /// `...` when the text was longer.
    pub text_excerpt: String,
}

impl Citation {
    /// Cite a retrieved chunk.
    pub fn from_chunk(chunk: &RetrievedChunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            document_name: chunk.document_name.clone(),
            text_excerpt: excerpt(&chunk.text, EXCERPT_CHARS),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, appending `...` when
/// anything was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// The final result of a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Generated natural-language answer.
    pub text: String,
    /// Citations in the order the generator referenced them.
    pub citations: Vec<Citation>,
}

impl Answer {
    /// The canned answer for queries with no retrieved context.
    pub fn no_relevant_information() -> Self {
        Self { text: NO_RELEVANT_INFORMATION.to_string(), citations: Vec::new() }
    }
}
