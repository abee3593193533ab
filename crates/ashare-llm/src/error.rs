use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("llm service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout waiting for llm response")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type LlmResult<T> = Result<T, LlmError>;
