use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}
