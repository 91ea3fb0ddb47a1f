//! Document ingestion pipeline.
//!
//! The [`IngestionPipeline`] turns one document file into stored, searchable
//! chunk records by composing a [`DocumentLoader`], a [`Chunker`], an
//! [`EmbeddingProvider`] and a [`VectorStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use doctalk_rag::{FileLoader, IngestionPipeline, InMemoryVectorStore, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::default()))
//!     .build()?;
//!
//! let summary = pipeline.ingest("docs/handbook.pdf").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, LoadedSection, Metadata};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, FileLoader};
use crate::vectorstore::VectorStore;

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// File name of the ingested document.
    pub document_name: String,
    /// The identifier generated for this ingestion; `None` when the document
    /// had no text and nothing was stored.
    pub document_id: Option<String>,
    /// Number of chunk records written.
    pub chunk_count: usize,
}

/// Per-file result of [`IngestionPipeline::ingest_batch`].
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<IngestSummary>,
}

/// The ingestion pipeline: load → chunk → embed → store.
///
/// Re-ingesting a file is append-only: every call generates a fresh
/// `document_id`, so the same file ingested twice yields two independent
/// sets of chunk records.
pub struct IngestionPipeline {
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Ingest a single document file.
    ///
    /// A document whose loader yields no text is not an error: nothing is
    /// stored and the summary reports zero chunks.
    ///
    /// # Errors
    ///
    /// Propagates loader errors ([`RagError::NotFoundError`],
    /// [`RagError::UnsupportedFormatError`], [`RagError::LoadError`]) and
    /// service errors from embedding or storage.
    pub async fn ingest(&self, path: impl AsRef<Path>) -> Result<IngestSummary> {
        let path = path.as_ref();
        let document_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let sections = self.loader.load(path).await?;

        let pieces = self.split_sections(&sections);
        if pieces.is_empty() {
            info!(document.name = %document_name, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestSummary { document_name, document_id: None, chunk_count: 0 });
        }

        let document_id = Uuid::new_v4().to_string();

        let texts: Vec<&str> = pieces.iter().map(|(text, _)| text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
            error!(document.id = %document_id, error = %e, "embedding failed during ingestion");
        })?;

        if embeddings.len() != pieces.len() {
            return Err(RagError::EmbeddingError {
                provider: "pipeline".to_string(),
                message: format!(
                    "expected {} embeddings for document '{document_name}', got {}",
                    pieces.len(),
                    embeddings.len()
                ),
            });
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, ((text, metadata), embedding))| Chunk {
                text,
                embedding,
                document_name: document_name.clone(),
                document_id: document_id.clone(),
                chunk_index,
                metadata,
            })
            .collect();

        self.vector_store.insert_chunks(&chunks).await.inspect_err(|e| {
            error!(document.id = %document_id, error = %e, "insert failed during ingestion");
        })?;

        let chunk_count = chunks.len();
        info!(document.id = %document_id, document.name = %document_name, chunk_count, "ingested document");

        Ok(IngestSummary { document_name, document_id: Some(document_id), chunk_count })
    }

    /// Ingest several files independently.
    ///
    /// A failure on one file is logged and reported in its [`BatchItem`];
    /// it never stops the remaining files.
    pub async fn ingest_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let result = self.ingest(path).await;
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "skipping document after ingestion failure");
            }
            items.push(BatchItem { path: path.to_path_buf(), result });
        }
        items
    }

    /// Chunk every section, pairing each chunk text with its section's
    /// metadata. Blank chunks are dropped so chunk indices stay contiguous.
    fn split_sections(&self, sections: &[LoadedSection]) -> Vec<(String, Metadata)> {
        sections
            .iter()
            .flat_map(|section| {
                self.chunker
                    .split(&section.text)
                    .into_iter()
                    .filter(|text| !text.trim().is_empty())
                    .map(move |text| (text, section.metadata.clone()))
            })
            .collect()
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// The embedding provider and vector store are required. The loader defaults
/// to [`FileLoader`]; the chunker defaults to a [`RecursiveChunker`] built
/// from the config (or [`RagConfig::default`]).
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl IngestionPipelineBuilder {
    /// Set the configuration used for the default chunker.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the chunker, overriding the one derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`IngestionPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&self.config.unwrap_or_default())),
        };
        let loader: Arc<dyn DocumentLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(FileLoader::new()),
        };

        Ok(IngestionPipeline { loader, chunker, embedding_provider, vector_store })
    }
}
