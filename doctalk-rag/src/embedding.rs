//! Embedding provider trait for turning text into fixed-length vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Every vector returned by one provider has the same length,
/// [`dimensions`](EmbeddingProvider::dimensions). Calls are single bounded
/// request/response exchanges; failures surface as
/// [`RagError::EmbeddingError`](crate::RagError::EmbeddingError) and are not
/// retried here.
///
/// # Example
///
/// ```rust,ignore
/// use doctalk_rag::EmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Returns exactly one vector per input, in input order. An empty batch
    /// returns an empty `Vec` without contacting the backend.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
