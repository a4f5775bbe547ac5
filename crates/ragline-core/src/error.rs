//! Error taxonomy shared by every pipeline stage.
//!
//! Each variant carries the underlying message verbatim so callers at the
//! boundary (CLI, HTTP) can surface it unchanged. Zero retrieval results
//! is not an error and has no variant here.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad path, oversized file or invalid parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No loader is registered for the file extension.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// None of the candidate text encodings could decode the file.
    #[error("could not decode '{path}' with any of: {}", tried.join(", "))]
    Decode {
        path: String,
        tried: Vec<&'static str>,
    },

    /// Both the primary and the fallback extraction strategies failed.
    #[error("text extraction failed for '{path}': {message}")]
    ExtractionFailed { path: String, message: String },

    /// The loaded document has no non-whitespace content.
    #[error("document '{0}' contains no text")]
    EmptyDocument(String),

    /// Insert was called with a document that has no chunks.
    #[error("document '{0}' has no chunks to index")]
    EmptyChunks(String),

    #[error("embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("language model backend error: {0}")]
    LlmBackend(String),

    /// The vector index engine rejected an operation.
    #[error("vector store error: {0}")]
    Store(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingBackend(message.into())
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::LlmBackend(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Short machine-readable code, used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Decode { .. } => "decode_error",
            Error::ExtractionFailed { .. } => "extraction_failed",
            Error::EmptyDocument(_) => "empty_document",
            Error::EmptyChunks(_) => "empty_chunks",
            Error::EmbeddingBackend(_) => "embedding_backend",
            Error::LlmBackend(_) => "llm_backend",
            Error::Store(_) => "store_error",
            Error::SessionNotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_lists_encodings() {
        let err = Error::Decode {
            path: "notes.txt".into(),
            tried: vec!["utf-8", "latin-1"],
        };
        assert_eq!(
            err.to_string(),
            "could not decode 'notes.txt' with any of: utf-8, latin-1"
        );
    }

    #[test]
    fn test_helper_constructors_keep_message() {
        let err = Error::embedding("connection refused");
        assert!(matches!(err, Error::EmbeddingBackend(ref m) if m == "connection refused"));
        assert_eq!(err.code(), "embedding_backend");
    }
}
