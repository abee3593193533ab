use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ashare_core::Message;

use crate::error::{LlmError, LlmResult};
use crate::provider::{LlmProvider, ModelTier, ToolSpec};

/// Deterministic `LlmProvider` for tests: returns a pre-scripted sequence of
/// assistant messages, one per call, in order. Used to exercise the agent
/// runtime's tool-call loop and the debate state machines without a live LLM.
pub struct MockLlmProvider {
    script: Mutex<VecDeque<Message>>,
}

impl MockLlmProvider {
    pub fn new(script: Vec<Message>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()) }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, _messages: &[Message], _tools: &[ToolSpec], _tier: ModelTier) -> LlmResult<Message> {
        let mut script = self.script.lock().unwrap();
        script
            .pop_front()
            .ok_or_else(|| LlmError::Other("mock llm script exhausted".into()))
    }

    fn quick_model(&self) -> &str {
        "mock-quick"
    }

    fn deep_model(&self) -> &str {
        "mock-deep"
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_messages_in_order() {
        let provider = MockLlmProvider::new(vec![
            Message::assistant("first", vec![]),
            Message::assistant("second", vec![]),
        ]);
        let first = provider.chat(&[], &[], ModelTier::Quick).await.unwrap();
        assert_eq!(first.content, "first");
        let second = provider.chat(&[], &[], ModelTier::Quick).await.unwrap();
        assert_eq!(second.content, "second");
        assert!(provider.chat(&[], &[], ModelTier::Quick).await.is_err());
    }
}
