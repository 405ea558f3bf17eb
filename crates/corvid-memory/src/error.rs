use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("vector store backend error: {0}")]
    Backend(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider returned an incomplete pair for: {0:?}")]
    EmbeddingIncomplete(String),

    #[error("no fact found with id {0}")]
    NotFound(String),

    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
