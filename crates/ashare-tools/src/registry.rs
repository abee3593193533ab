use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::retry::{retry_with_backoff, BackoffPolicy};
use crate::suggestions::diagnostic_message;

/// A single registered operation agents can invoke: a stable name, a
/// JSON-schema input contract, a free-text description, and an async
/// callable returning Markdown-or-plain-text content.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError>;

    /// The data-source label attached to the response envelope's `source`.
    fn source(&self) -> &str {
        self.name()
    }
}

/// Catalog of named tools plus the retry/backoff dispatch policy applied
/// uniformly to every call.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
    policy: BackoffPolicy,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: DashMap::new(), policy: BackoffPolicy::default() }
    }

    pub fn with_policy(policy: BackoffPolicy) -> Self {
        Self { tools: DashMap::new(), policy }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.clone())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }

    /// Dispatches a tool call under the retry/backoff policy, returning the
    /// uniform envelope. Never returns an `Err` — failures are surfaced as a
    /// failed envelope so the agent runtime can always append a tool-result
    /// message and continue.
    #[instrument(skip(self, args))]
    pub async fn dispatch(&self, name: &str, args: &serde_json::Value) -> ToolResponse {
        let Some(tool) = self.get(name) else {
            return ToolResponse::fail(
                format!("unknown tool: {name}"),
                crate::error::ErrorCategory::InvalidParam,
                "registry",
                0,
            );
        };

        let source = tool.source().to_string();
        let result = retry_with_backoff(self.policy, name, || {
            let tool = tool.clone();
            let args = args.clone();
            async move { tool.call(&args).await }
        })
        .await;

        match result {
            Ok((data, retried)) => ToolResponse::ok(data, source, retried),
            Err((err, retried)) => {
                let category = err.category();
                let diagnostic = diagnostic_message(&source, name, &err);
                ToolResponse::fail(diagnostic, category, source, retried)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTool {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "fails a few times then succeeds"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: &serde_json::Value) -> Result<String, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(ToolError::RateLimit("429 too many requests".into()))
            } else {
                Ok("data".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_reports_retried_count_on_success() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FlakyTool { failures_before_success: 2, calls: AtomicU32::new(0) }));

        let resp = registry.dispatch("flaky", &serde_json::json!({})).await;
        assert!(resp.success);
        assert_eq!(resp.retried, 2);
    }

    #[tokio::test]
    async fn dispatch_reports_invalid_param_for_unknown_tool() {
        let registry = ToolRegistry::new();
        let resp = registry.dispatch("missing", &serde_json::json!({})).await;
        assert!(!resp.success);
        assert_eq!(resp.retried, 0);
    }

    struct AlwaysAuthFailTool;

    #[async_trait]
    impl Tool for AlwaysAuthFailTool {
        fn name(&self) -> &str {
            "always_auth_fail"
        }
        fn description(&self) -> &str {
            "always fails with a non-retryable auth error"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: &serde_json::Value) -> Result<String, ToolError> {
            Err(ToolError::Auth("401 bad token".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_reports_zero_retries_for_non_retryable_category() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(AlwaysAuthFailTool));

        let resp = registry.dispatch("always_auth_fail", &serde_json::json!({})).await;
        assert!(!resp.success);
        assert_eq!(resp.error_category, Some(crate::error::ErrorCategory::Auth));
        assert_eq!(resp.retried, 0);
    }
}
