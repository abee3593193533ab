use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error category taxonomy a tool call's failure is classified into.
/// Ordering of the `classify` match arms matters: network-ish tokens are
/// checked first, then timeout, then rate-limit, then auth, then invalid
/// param, then server, then not-found, falling through to unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimit,
    Auth,
    NotFound,
    InvalidParam,
    Server,
    Unknown,
}

impl ErrorCategory {
    /// Retryable: NETWORK, TIMEOUT, RATE_LIMIT, SERVER. AUTH, INVALID_PARAM,
    /// and NOT_FOUND never retry.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::RateLimit | ErrorCategory::Server
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Auth => "auth",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidParam => "invalid_param",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// Errors a `Tool::call` implementation can raise before retry/backoff takes
/// over. Carries enough of a message for `classify_error` to categorise it.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    RateLimit(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidParam(String),
    #[error("{0}")]
    Server(String),
    #[error("{0}")]
    Unknown(String),
}

impl ToolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ToolError::Network(_) => ErrorCategory::Network,
            ToolError::Timeout(_) => ErrorCategory::Timeout,
            ToolError::RateLimit(_) => ErrorCategory::RateLimit,
            ToolError::Auth(_) => ErrorCategory::Auth,
            ToolError::NotFound(_) => ErrorCategory::NotFound,
            ToolError::InvalidParam(_) => ErrorCategory::InvalidParam,
            ToolError::Server(_) => ErrorCategory::Server,
            ToolError::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Classifies a free-text error message the way `classify_error` does in
    /// the original: ordered substring matching, falling through to Unknown.
    pub fn classify_message(message: &str) -> ErrorCategory {
        let lower = message.to_ascii_lowercase();

        let any = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));

        if any(&["connection", "network", "socket", "refused"]) {
            return ErrorCategory::Network;
        }
        if lower.contains("timeout") {
            return ErrorCategory::Timeout;
        }
        if any(&["rate limit", "too many requests", "429", "限流"]) {
            return ErrorCategory::RateLimit;
        }
        if any(&["auth", "token", "401", "403", "credential", "权限"]) {
            return ErrorCategory::Auth;
        }
        if any(&["invalid", "parameter", "argument", "参数"]) {
            return ErrorCategory::InvalidParam;
        }
        if any(&["500", "502", "503", "504", "server"]) {
            return ErrorCategory::Server;
        }
        if any(&["not found", "404", "不存在", "无数据"]) {
            return ErrorCategory::NotFound;
        }
        ErrorCategory::Unknown
    }
}
