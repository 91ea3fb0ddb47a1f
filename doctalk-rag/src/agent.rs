//! Retrieval-answer agent.
//!
//! [`RagAgent::ask`] runs one linear pass per query: retrieve the top-k
//! chunks, then either return the canned "no information" answer or number
//! the chunks into a prompt, generate a structured answer, and resolve the
//! generator's chunk numbers back into [`Citation`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use doctalk_rag::{RagAgent, RagConfig};
//!
//! let agent = RagAgent::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .generator(generator)
//!     .build()?;
//!
//! let answer = agent.ask("What is the refund policy?").await?;
//! for citation in &answer.citations {
//!     println!("{}: {}", citation.document_name, citation.text_excerpt);
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::{Answer, Citation, RetrievedChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::AnswerGenerator;
use crate::vectorstore::VectorStore;

/// Retrieved chunks numbered `1..=N` in retrieval order for one prompt.
///
/// The numbers are the generator's only handle on chunk identity. They are
/// scoped to a single query and never stored.
#[derive(Debug, Clone, Copy)]
pub struct NumberedContext<'a> {
    chunks: &'a [RetrievedChunk],
}

impl<'a> NumberedContext<'a> {
    pub fn new(chunks: &'a [RetrievedChunk]) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The chunk shown as `[number]`, if any.
    pub fn resolve(&self, number: i64) -> Option<&'a RetrievedChunk> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.chunks.get(index)
    }

    /// `[n] <text>` per chunk, separated by blank lines.
    pub fn render(&self) -> String {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Citations for the referenced numbers, in referenced order.
    ///
    /// Numbers outside `1..=N` are dropped, as are repeats of a number
    /// already cited: a chunk is cited once, at its first reference.
    pub fn citations(&self, referenced: &[i64]) -> Vec<Citation> {
        let mut seen = HashSet::new();
        let mut citations = Vec::new();
        for &number in referenced {
            match self.resolve(number) {
                Some(chunk) if seen.insert(number) => citations.push(Citation::from_chunk(chunk)),
                Some(_) => debug!(number, "ignoring repeated chunk reference"),
                None => warn!(number, available = self.len(), "dropping unknown chunk reference"),
            }
        }
        citations
    }
}

/// Build the generation prompt around a rendered context block.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based only on the provided context.

Context:
{context}

Question: {query}

Instructions:
- Answer the question using only the information from the context above
- If the context doesn't contain enough information, say so clearly
- In your response, specify which chunk numbers (1, 2, 3, etc.) you used to construct your answer
- Only include chunk numbers that you actually used to answer the question
- Be concise and accurate

Answer the question and specify which chunks you used:"
    )
}

/// Answers questions from the vector store with citations.
///
/// Holds no per-query state, so one agent can serve concurrent queries.
pub struct RagAgent {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
}

impl RagAgent {
    /// Create a new [`RagAgentBuilder`].
    pub fn builder() -> RagAgentBuilder {
        RagAgentBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer `query`: retrieve, then generate.
    ///
    /// # Errors
    ///
    /// Embedding, search and generation failures propagate unchanged; there
    /// is no retry. Malformed chunk references from the generator are not
    /// errors.
    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let chunks = self.retrieve(query).await?;
        self.generate(query, &chunks).await
    }

    /// Embed the query and fetch the `top_k` most similar chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        let records = self
            .vector_store
            .vector_search(&query_embedding, self.config.top_k, self.config.num_candidates)
            .await
            .inspect_err(|e| error!(error = %e, "vector search failed"))?;

        let chunks: Vec<RetrievedChunk> = records.iter().map(RetrievedChunk::from_record).collect();
        debug!(result_count = chunks.len(), top_k = self.config.top_k, "retrieved chunks");
        Ok(chunks)
    }

    /// Generate a cited answer from already retrieved chunks.
    ///
    /// With no chunks, returns [`Answer::no_relevant_information`] without
    /// calling the generator.
    pub async fn generate(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<Answer> {
        if chunks.is_empty() {
            info!(result_count = 0, "no relevant chunks; skipping generation");
            return Ok(Answer::no_relevant_information());
        }

        let context = NumberedContext::new(chunks);
        let prompt = build_prompt(query, &context.render());

        let response = self.generator.generate(&prompt).await.inspect_err(|e| {
            error!(generator = self.generator.name(), error = %e, "answer generation failed");
        })?;

        let citations = context.citations(&response.referenced_chunk_numbers);
        info!(
            result_count = chunks.len(),
            referenced = response.referenced_chunk_numbers.len(),
            citation_count = citations.len(),
            "query answered"
        );

        Ok(Answer { text: response.answer, citations })
    }
}

/// Builder for constructing a [`RagAgent`].
///
/// The embedding provider, vector store and generator are required; the
/// config defaults to [`RagConfig::default`].
#[derive(Default)]
pub struct RagAgentBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl RagAgentBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagAgent`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<RagAgent> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        Ok(RagAgent {
            config: self.config.unwrap_or_default(),
            embedding_provider,
            vector_store,
            generator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn chunk(id: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            document_name: "doc.txt".to_string(),
            document_id: "d1".to_string(),
            chunk_index: 0,
            score: 1.0,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn renders_numbered_context() {
        let chunks = vec![chunk("a", "first"), chunk("b", "second")];
        let context = NumberedContext::new(&chunks);
        assert_eq!(context.render(), "[1] first\n\n[2] second");
    }

    #[test]
    fn resolves_only_known_numbers() {
        let chunks = vec![chunk("a", "one"), chunk("b", "two"), chunk("c", "three")];
        let context = NumberedContext::new(&chunks);
        assert_eq!(context.resolve(1).map(|c| c.chunk_id.as_str()), Some("a"));
        assert_eq!(context.resolve(3).map(|c| c.chunk_id.as_str()), Some("c"));
        assert!(context.resolve(0).is_none());
        assert!(context.resolve(4).is_none());
        assert!(context.resolve(-2).is_none());
    }

    #[test]
    fn citations_follow_reference_order_and_skip_invalid() {
        let chunks = vec![chunk("a", "one"), chunk("b", "two"), chunk("c", "three")];
        let context = NumberedContext::new(&chunks);

        let citations = context.citations(&[2, 5, 99]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_id, "b");

        let ids: Vec<String> =
            context.citations(&[3, 1, 3, 0]).into_iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = build_prompt("Why?", "[1] Because.");
        assert!(prompt.contains("Context:\n[1] Because.\n\nQuestion: Why?"));
        assert!(prompt.contains("say so clearly"));
        assert!(prompt.ends_with("specify which chunks you used:"));
    }
}
