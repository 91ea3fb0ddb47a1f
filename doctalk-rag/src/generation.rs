//! Answer generation boundary.
//!
//! An [`AnswerGenerator`] turns a fully rendered prompt into a
//! [`GeneratedAnswer`]: free-text answer plus the prompt-local numbers of the
//! context chunks it used. Responses are schema-constrained data, never free
//! text parsed ad hoc.

use async_trait::async_trait;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{RagError, Result};

/// Name under which the response schema is registered with providers.
pub const RESPONSE_SCHEMA_NAME: &str = "llm_response";

/// Structured output of the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// Natural-language answer.
    pub answer: String,
    /// Context chunk numbers (1-based) the answer relied on. Untrusted:
    /// values outside the retrieved range are possible.
    pub referenced_chunk_numbers: Vec<i64>,
}

impl GeneratedAnswer {
    /// JSON Schema describing a valid response.
    pub fn response_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Answer to the question, using only the provided context"
                },
                "referenced_chunk_numbers": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Numbers of the context chunks used to construct the answer"
                }
            },
            "required": ["answer", "referenced_chunk_numbers"],
            "additionalProperties": false
        })
    }

    /// Validate `raw` against [`response_schema`](Self::response_schema) and
    /// deserialize it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if `raw` is not JSON or does not
    /// match the schema.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RagError::ValidationError(format!("response is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate an already parsed response value and deserialize it.
    pub fn from_value(value: Value) -> Result<Self> {
        let validator = Validator::new(&Self::response_schema())
            .map_err(|e| RagError::ValidationError(format!("invalid response schema: {e}")))?;

        let violations: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
        if !violations.is_empty() {
            return Err(RagError::ValidationError(format!(
                "response does not match schema: {}",
                violations.join("; ")
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| RagError::ValidationError(format!("failed to decode response: {e}")))
    }
}

/// A language model that answers a prompt with a [`GeneratedAnswer`].
///
/// Implementations must constrain the model to
/// [`GeneratedAnswer::response_schema`] and report malformed output as
/// [`RagError::ValidationError`]; transport, auth and quota failures are
/// [`RagError::GenerationError`].
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate a structured answer for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<GeneratedAnswer>;

    /// Provider or model name, for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_response() {
        let parsed = GeneratedAnswer::from_json(
            r#"{"answer": "Paris.", "referenced_chunk_numbers": [2, 1]}"#,
        )
        .unwrap();
        assert_eq!(parsed.answer, "Paris.");
        assert_eq!(parsed.referenced_chunk_numbers, vec![2, 1]);
    }

    #[test]
    fn rejects_missing_field() {
        let err = GeneratedAnswer::from_json(r#"{"answer": "Paris."}"#).unwrap_err();
        assert!(matches!(err, RagError::ValidationError(_)));
    }

    #[test]
    fn rejects_wrong_item_type() {
        let err = GeneratedAnswer::from_json(
            r#"{"answer": "x", "referenced_chunk_numbers": ["two"]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RagError::ValidationError(_)));
    }

    #[test]
    fn rejects_extra_properties_and_non_json() {
        assert!(
            GeneratedAnswer::from_json(
                r#"{"answer": "x", "referenced_chunk_numbers": [], "confidence": 0.9}"#
            )
            .is_err()
        );
        assert!(GeneratedAnswer::from_json("The answer is 42 [1]").is_err());
    }

    #[test]
    fn accepts_negative_numbers_as_data() {
        let parsed =
            GeneratedAnswer::from_json(r#"{"answer": "x", "referenced_chunk_numbers": [-1, 0]}"#)
                .unwrap();
        assert_eq!(parsed.referenced_chunk_numbers, vec![-1, 0]);
    }
}
