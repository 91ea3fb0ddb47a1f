//! # doctalk-rag
//!
//! Document ingestion and citation-grounded question answering over a
//! private document corpus.
//!
//! ## Overview
//!
//! Two pipelines share one vector store:
//!
//! - **Ingestion** ([`IngestionPipeline`]): load a `.pdf`, `.txt`, `.md` or
//!   `.docx` file, split it into overlapping chunks, embed every chunk in one
//!   batch and store the chunks with their provenance.
//! - **Query** ([`RagAgent`]): embed a question, retrieve the top-k most
//!   similar chunks, number them into a prompt, and resolve the numbers the
//!   language model cites back into [`Citation`]s with document names and
//!   excerpts.
//!
//! Embedding, generation and storage sit behind the [`EmbeddingProvider`],
//! [`AnswerGenerator`] and [`VectorStore`] traits.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI embeddings and structured chat completions |
//! | `mongodb` | MongoDB Atlas Vector Search store |
//! | `full` | Everything above |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use doctalk_rag::{InMemoryVectorStore, IngestionPipeline, RagAgent, RagConfig, Similarity};
//! use doctalk_rag::openai::{OpenAIAnswerGenerator, OpenAIEmbeddingProvider};
//!
//! let config = RagConfig::default();
//! let embedder = Arc::new(OpenAIEmbeddingProvider::from_env()?);
//! let store = Arc::new(InMemoryVectorStore::new(Similarity::Cosine));
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(config.clone())
//!     .embedding_provider(embedder.clone())
//!     .vector_store(store.clone())
//!     .build()?;
//! pipeline.ingest("handbook.pdf").await?;
//!
//! let agent = RagAgent::builder()
//!     .config(config)
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .generator(Arc::new(OpenAIAnswerGenerator::from_env()?))
//!     .build()?;
//! let answer = agent.ask("How many vacation days do I get?").await?;
//! ```

pub mod agent;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod loader;
pub mod pipeline;
pub mod vectorstore;

#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "openai")]
pub mod openai;

pub use agent::{NumberedContext, RagAgent, RagAgentBuilder, build_prompt};
pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Chunk, Citation, EXCERPT_CHARS, LoadedSection, Metadata, NO_RELEVANT_INFORMATION,
    RetrievedChunk, SearchRecord, excerpt,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{AnswerGenerator, GeneratedAnswer, RESPONSE_SCHEMA_NAME};
pub use inmemory::InMemoryVectorStore;
pub use loader::{DocumentLoader, FileFormat, FileLoader, SUPPORTED_EXTENSIONS, collect_files};
pub use pipeline::{BatchItem, IngestSummary, IngestionPipeline, IngestionPipelineBuilder};
pub use vectorstore::{Similarity, VectorStore};

#[cfg(feature = "mongodb")]
pub use crate::mongo::{MongoConfig, MongoVectorStore};
#[cfg(feature = "openai")]
pub use crate::openai::{EmbeddingUsage, OpenAIAnswerGenerator, OpenAIEmbeddingProvider};
