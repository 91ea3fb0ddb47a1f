//! In-memory vector store using an exact similarity scan.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `Vec` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::document::{Chunk, SearchRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{Similarity, VectorStore};

#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    chunk: Chunk,
}

/// An in-memory vector store.
///
/// Search scans every record, so results are exact and `num_candidates`
/// has no effect beyond the usual `limit`.
///
/// # Example
///
/// ```rust,ignore
/// use doctalk_rag::{InMemoryVectorStore, Similarity, VectorStore};
///
/// let store = InMemoryVectorStore::new(Similarity::Cosine);
/// store.insert_chunks(&chunks).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    similarity: Similarity,
    records: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    /// Create a new empty store scoring with the given metric.
    pub fn new(similarity: Similarity) -> Self {
        Self { similarity, records: RwLock::default() }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// A copy of every stored chunk in insertion order.
    pub async fn chunks(&self) -> Vec<Chunk> {
        self.records.read().await.iter().map(|r| r.chunk.clone()).collect()
    }
}

/// Shape a stored chunk the way a document store would return it: all fields
/// except the embedding, plus `_id` and `score`.
fn to_record(stored: &StoredChunk, score: f32) -> Result<SearchRecord> {
    let mut record = match serde_json::to_value(&stored.chunk) {
        Ok(Value::Object(map)) => map,
        Ok(_) => SearchRecord::new(),
        Err(e) => {
            return Err(RagError::VectorStoreError {
                backend: "InMemory".to_string(),
                message: format!("failed to serialize chunk: {e}"),
            });
        }
    };
    record.remove("embedding");
    record.insert("_id".to_string(), Value::String(stored.id.clone()));
    record.insert("score".to_string(), Value::from(f64::from(score)));
    Ok(record)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut records = self.records.write().await;
        records.extend(
            chunks
                .iter()
                .map(|chunk| StoredChunk { id: Uuid::new_v4().to_string(), chunk: chunk.clone() }),
        );
        debug!(count = chunks.len(), total = records.len(), "inserted chunks in memory");
        Ok(())
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        _num_candidates: usize,
    ) -> Result<Vec<SearchRecord>> {
        let records = self.records.read().await;

        let mut scored: Vec<(f32, &StoredChunk)> = records
            .iter()
            .map(|stored| (self.similarity.score(&stored.chunk.embedding, embedding), stored))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored.into_iter().map(|(score, stored)| to_record(stored, score)).collect()
    }

    async fn clear(&self) -> Result<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        debug!(removed, "cleared in-memory store");
        Ok(removed)
    }
}
