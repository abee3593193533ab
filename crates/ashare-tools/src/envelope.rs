use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

/// Uniform response envelope every tool call returns internally, whether it
/// succeeded or exhausted retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub retried: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ToolResponse {
    pub fn ok(data: impl Into<String>, source: impl Into<String>, retried: u32) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
            error_category: None,
            retried,
            source: Some(source.into()),
        }
    }

    pub fn fail(error: impl Into<String>, category: ErrorCategory, source: impl Into<String>, retried: u32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_category: Some(category),
            retried,
            source: Some(source.into()),
        }
    }

    /// The string content surfaced to the calling agent: `data` on success,
    /// a diagnostic naming the error category on failure.
    pub fn to_agent_content(&self) -> String {
        if self.success {
            self.data.clone().unwrap_or_default()
        } else {
            format!(
                "[{}] {}",
                self.error_category.map(|c| c.as_str()).unwrap_or("error"),
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}
