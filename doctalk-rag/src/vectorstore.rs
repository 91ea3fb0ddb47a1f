//! Vector store trait for persisting chunks and searching them by similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchRecord};
use crate::error::Result;

/// A storage backend for [`Chunk`]s with approximate nearest-neighbour search
/// over their embeddings.
///
/// The store owns persisted chunks exclusively. It is the only shared
/// mutable resource in the system, so a single bulk insert or bulk delete
/// must be atomic from the caller's point of view; nothing stronger is
/// required.
///
/// # Example
///
/// ```rust,ignore
/// use doctalk_rag::{InMemoryVectorStore, Similarity, VectorStore};
///
/// let store = InMemoryVectorStore::new(Similarity::Cosine);
/// store.insert_chunks(&chunks).await?;
/// let records = store.vector_search(&query_embedding, 5, 50).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append chunks. A no-op for an empty slice. Records are never
    /// deduplicated; each receives a fresh store-generated id.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `limit` records ranked by descending similarity to
    /// `embedding`, examining a pool of `num_candidates` candidates first.
    ///
    /// Records carry `_id` and `score` and never the raw `embedding`.
    async fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        num_candidates: usize,
    ) -> Result<Vec<SearchRecord>>;

    /// Delete every record. Irreversible. Returns the number of records removed.
    async fn clear(&self) -> Result<u64>;
}

/// Similarity metric of a vector index.
///
/// Must match the geometry of the embedding model when the index is created;
/// a mismatch degrades relevance silently rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Similarity {
    #[default]
    Cosine,
    DotProduct,
    Euclidean,
}

impl Similarity {
    /// Score two vectors; higher is more similar.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Self::Euclidean => {
                let distance: f32 =
                    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }

    /// The name used by Atlas vector index definitions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::DotProduct => "dotProduct",
            Self::Euclidean => "euclidean",
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_ignores_magnitude() {
        let score = Similarity::Cosine.score(&[1.0, 0.0], &[5.0, 0.0]);
        assert!((score - 1.0).abs() < 1e-6);
        assert_eq!(Similarity::Cosine.score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn euclidean_is_higher_for_closer_vectors() {
        let near = Similarity::Euclidean.score(&[1.0, 1.0], &[1.0, 1.1]);
        let far = Similarity::Euclidean.score(&[1.0, 1.0], &[4.0, 5.0]);
        assert!(near > far);
        assert!((Similarity::Euclidean.score(&[2.0], &[2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn names_match_index_definitions() {
        assert_eq!(Similarity::DotProduct.as_str(), "dotProduct");
        assert_eq!(serde_json::to_value(Similarity::DotProduct).unwrap(), "dotProduct");
    }
}
