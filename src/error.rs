//! Typed error taxonomy for the engine's public surface.
//!
//! Internal helpers still use `anyhow` for convenience; anything that
//! crosses a subsystem boundary is converted into an [`EngineError`]
//! variant so callers can match on a stable kind rather than parsing
//! message strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("document processing error: {0}")]
    DocumentProcessing(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Repository(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::VectorStore(err.to_string())
    }
}
