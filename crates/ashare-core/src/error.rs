use thiserror::Error;

/// Ambient error type shared across crate boundaries for conditions that are
/// not already captured by a more specific error enum (`ToolError`,
/// `MemoryError`, `OrchestratorError`, ...).
#[derive(Debug, Error)]
pub enum AshareError {
    #[error("invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("graph recursion limit exceeded ({0} iterations)")]
    RecursionLimitExceeded(usize),

    #[error("run cancelled by user")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
