use async_trait::async_trait;
use ashare_core::Message;
use serde::{Deserialize, Serialize};

use crate::error::LlmResult;

/// Tool description handed to the LLM alongside the message list, mirroring
/// the JSON-schema input contract each registered tool carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Which of a provider's two configured models a call should use: `Quick`
/// for analyst-tier agents, `Deep` for the judges and the consolidation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Quick,
    Deep,
}

/// Backend-agnostic interface for a single chat-completion round.
///
/// A round carries the full message trail plus the tool subset bound to the
/// calling role; it returns one assistant message, which may itself contain
/// tool calls the agent runtime must dispatch before looping back in.
///
/// Providers that cannot natively carry a reasoning trace between tool-call
/// rounds are responsible for echoing back their own opaque continuation
/// token on the next call — that bookkeeping lives entirely in the adapter,
/// never in the graph or the agent runtime above it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec], tier: ModelTier) -> LlmResult<Message>;

    /// Model identifier this provider is currently bound to use for "quick"
    /// (analyst-tier) calls versus "deep" (judge/consolidation-tier) calls.
    fn quick_model(&self) -> &str;
    fn deep_model(&self) -> &str;

    fn backend_name(&self) -> &'static str;
}
