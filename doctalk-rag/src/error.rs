//! Error types for the `doctalk-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The input path does not exist.
    #[error("File not found: {}", path.display())]
    NotFoundError {
        /// The path that could not be resolved.
        path: PathBuf,
    },

    /// The input path has an extension no loader recognises.
    #[error("Unsupported file type '{extension}': {}", path.display())]
    UnsupportedFormatError {
        /// The offending path.
        path: PathBuf,
        /// The extension as found on the path (may be empty).
        extension: String,
    },

    /// A recognised document could not be read or parsed.
    #[error("Failed to load {}: {message}", path.display())]
    LoadError {
        /// The document path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred calling the answer generation service.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A structured generation response did not match the expected schema.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Whether this error came from one of the external services
    /// (embedding, vector store or generation).
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingError { .. } | Self::VectorStoreError { .. } | Self::GenerationError { .. }
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_are_classified() {
        let embed = RagError::EmbeddingError { provider: "OpenAI".into(), message: "429".into() };
        let store = RagError::VectorStoreError { backend: "mongodb".into(), message: "x".into() };
        let generation =
            RagError::GenerationError { provider: "OpenAI".into(), message: "timeout".into() };
        assert!(embed.is_service_error());
        assert!(store.is_service_error());
        assert!(generation.is_service_error());

        assert!(!RagError::ValidationError("bad".into()).is_service_error());
        assert!(!RagError::NotFoundError { path: "a.txt".into() }.is_service_error());
    }

    #[test]
    fn display_includes_path() {
        let err = RagError::UnsupportedFormatError {
            path: PathBuf::from("notes.xlsx"),
            extension: ".xlsx".into(),
        };
        assert_eq!(err.to_string(), "Unsupported file type '.xlsx': notes.xlsx");
    }
}
