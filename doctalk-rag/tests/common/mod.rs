//! Deterministic test doubles for the service traits.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use doctalk_rag::document::{Chunk, SearchRecord};
use doctalk_rag::embedding::EmbeddingProvider;
use doctalk_rag::error::{RagError, Result};
use doctalk_rag::generation::{AnswerGenerator, GeneratedAnswer};
use doctalk_rag::vectorstore::VectorStore;
use serde_json::{Value, json};

pub const LETTER_DIMENSIONS: usize = 26;

/// Embeds text as its ASCII letter histogram. Texts sharing vocabulary land
/// close together, which is enough to exercise ranking without a network.
#[derive(Debug, Default)]
pub struct LetterEmbedder {
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl LetterEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; LETTER_DIMENSIONS];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        v
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        LETTER_DIMENSIONS
    }
}

/// An embedder whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".to_string(),
            message: "service unavailable".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        LETTER_DIMENSIONS
    }
}

/// Returns one scripted answer and records every prompt it receives.
#[derive(Debug)]
pub struct ScriptedGenerator {
    pub response: GeneratedAnswer,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(answer: &str, referenced: &[i64]) -> Self {
        Self {
            response: GeneratedAnswer {
                answer: answer.to_string(),
                referenced_chunk_numbers: referenced.to_vec(),
            },
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A generator that always fails.
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedAnswer> {
        Err(RagError::GenerationError {
            provider: "failing".to_string(),
            message: "quota exceeded".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A store that ignores the query and returns canned records, capturing the
/// search parameters it was called with.
#[derive(Debug, Default)]
pub struct FixedRecordStore {
    pub records: Vec<SearchRecord>,
    pub searches: Mutex<Vec<(usize, usize)>>,
}

impl FixedRecordStore {
    pub fn new(records: Vec<SearchRecord>) -> Self {
        Self { records, searches: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl VectorStore for FixedRecordStore {
    async fn insert_chunks(&self, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn vector_search(
        &self,
        _embedding: &[f32],
        limit: usize,
        num_candidates: usize,
    ) -> Result<Vec<SearchRecord>> {
        self.searches.lock().unwrap().push((limit, num_candidates));
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    async fn clear(&self) -> Result<u64> {
        Ok(0)
    }
}

/// A search record the way a document store would return it.
pub fn record(id: &str, text: &str, document_name: &str, score: f64) -> SearchRecord {
    as_record(json!({
        "_id": id,
        "text": text,
        "document_name": document_name,
        "document_id": format!("doc-{document_name}"),
        "chunk_index": 0,
        "score": score,
        "metadata": { "source": format!("/data/{document_name}") }
    }))
}

pub fn as_record(value: Value) -> SearchRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
