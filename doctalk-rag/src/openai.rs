//! OpenAI embedding and answer generation clients.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both clients call the REST API directly with `reqwest`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GeneratedAnswer, RESPONSE_SCHEMA_NAME};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model for answer generation.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "OpenAI";

fn read_api_key() -> std::result::Result<String, String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY environment variable not set".into())
}

fn build_client(timeout: Option<Duration>) -> std::result::Result<reqwest::Client, String> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| format!("failed to build HTTP client: {e}"))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into a readable message, preferring the API's
/// own error text.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── Embeddings ─────────────────────────────────────────────────────

/// Running totals of embedding calls made by one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingUsage {
    /// Number of API requests sent.
    pub calls: u64,
    /// Prompt tokens reported by the API.
    pub prompt_tokens: u64,
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `base_url` – defaults to [`OPENAI_API_BASE`]; any compatible endpoint works.
///
/// # Example
///
/// ```rust,ignore
/// use doctalk_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Self::err("API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            calls: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key().map_err(Self::err)?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`. A timed-out request fails the call.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout)).map_err(Self::err)?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Calls and tokens consumed so far.
    pub fn usage(&self) -> EmbeddingUsage {
        EmbeddingUsage {
            calls: self.calls.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
        }
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingTokenUsage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingTokenUsage {
    prompt_tokens: u64,
}

/// Order embeddings by their reported `index` and check there is exactly one
/// per input.
fn collect_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(OpenAIEmbeddingProvider::err(format!(
            "expected {expected} embeddings, API returned {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::err("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        self.calls.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::err(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %detail, "API error");
            return Err(Self::err(detail));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::err(format!("failed to parse response: {e}"))
        })?;

        if let Some(usage) = &embedding_response.usage {
            let total =
                self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed) + usage.prompt_tokens;
            debug!(
                provider = PROVIDER,
                prompt_tokens = usage.prompt_tokens,
                total_prompt_tokens = total,
                "embedding usage"
            );
        }

        collect_embeddings(embedding_response.data, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Answer generation ──────────────────────────────────────────────

/// An [`AnswerGenerator`] backed by the OpenAI chat completions API with
/// strict JSON-schema structured output.
///
/// # Example
///
/// ```rust,ignore
/// use doctalk_rag::openai::OpenAIAnswerGenerator;
///
/// let generator = OpenAIAnswerGenerator::from_env()?.with_model("gpt-4o");
/// let answer = generator.generate(&prompt).await?;
/// ```
pub struct OpenAIAnswerGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAIAnswerGenerator {
    /// Create a generator using `gpt-4o-mini` at temperature 0.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Self::err("API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.0,
        })
    }

    /// Create a generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key().map_err(Self::err)?)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point the generator at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`. A timed-out request fails the call.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout)).map_err(Self::err)?;
        Ok(self)
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::GenerationError { provider: PROVIDER.into(), message: message.into() }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": RESPONSE_SCHEMA_NAME,
                    "strict": true,
                    "schema": GeneratedAnswer::response_schema()
                }
            }
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Pull the structured answer out of a chat completion.
fn parse_completion(completion: ChatCompletionResponse) -> Result<GeneratedAnswer> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| OpenAIAnswerGenerator::err("API returned no choices"))?;

    if let Some(refusal) = message.refusal {
        return Err(OpenAIAnswerGenerator::err(format!("model refused: {refusal}")));
    }

    let content =
        message.content.ok_or_else(|| OpenAIAnswerGenerator::err("API returned no content"))?;
    GeneratedAnswer::from_json(&content)
}

#[async_trait]
impl AnswerGenerator for OpenAIAnswerGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedAnswer> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating answer");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::err(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %detail, "API error");
            return Err(Self::err(detail));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::err(format!("failed to parse response: {e}"))
        })?;

        parse_completion(completion)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new(""),
            Err(RagError::EmbeddingError { .. })
        ));
        assert!(matches!(
            OpenAIAnswerGenerator::new(""),
            Err(RagError::GenerationError { .. })
        ));
    }

    #[test]
    fn dimension_override_updates_reported_dimensions() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_dimensions(256);
        assert_eq!(provider.dimensions(), 256);
        assert_eq!(provider.usage(), EmbeddingUsage::default());
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        // Unroutable base URL: any request would fail.
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let vectors = provider.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.usage().calls, 0);
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let data = vec![
            EmbeddingData { index: 2, embedding: vec![3.0] },
            EmbeddingData { index: 0, embedding: vec![1.0] },
            EmbeddingData { index: 1, embedding: vec![2.0] },
        ];
        let ordered = collect_embeddings(data, 3).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_an_error() {
        let data = vec![EmbeddingData { index: 0, embedding: vec![1.0] }];
        assert!(collect_embeddings(data, 2).is_err());
    }

    #[test]
    fn request_body_uses_strict_schema() {
        let generator = OpenAIAnswerGenerator::new("sk-test").unwrap();
        let body = generator.request_body("question?");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            body["response_format"]["json_schema"]["schema"],
            GeneratedAnswer::response_schema()
        );
        assert_eq!(body["messages"][0]["content"], "question?");
    }

    #[test]
    fn completion_content_is_validated() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"answer\": \"Yes.\", \"referenced_chunk_numbers\": [1]}"}}]
        }))
        .unwrap();
        let parsed = parse_completion(completion).unwrap();
        assert_eq!(parsed.answer, "Yes.");
        assert_eq!(parsed.referenced_chunk_numbers, vec![1]);

        let malformed: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "Yes [1]"}}]
        }))
        .unwrap();
        assert!(matches!(parse_completion(malformed), Err(RagError::ValidationError(_))));
    }

    #[test]
    fn refusal_is_a_generation_error() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]
        }))
        .unwrap();
        assert!(matches!(parse_completion(completion), Err(RagError::GenerationError { .. })));
    }
}
