use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("recursion limit of {0} exceeded for role {1}")]
    RoleRecursionLimit(usize, String),

    #[error("graph recursion limit of {0} exceeded")]
    GraphRecursionLimit(usize),

    #[error("user-cancelled")]
    Cancelled,

    #[error(transparent)]
    Llm(#[from] ashare_llm::LlmError),

    #[error(transparent)]
    Memory(#[from] ashare_memory::MemoryError),

    #[error("{0}")]
    Other(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
