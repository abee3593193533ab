use std::time::Duration;

use async_trait::async_trait;
use ashare_core::{Message, Role, ToolCall};
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};
use crate::provider::{LlmProvider, ModelTier, ToolSpec};

/// Configuration for the HTTP-backed provider. `backend_url` is expected to
/// expose an OpenAI-compatible `/chat/completions` route, which every
/// supported provider kind (openai/anthropic-via-proxy/dashscope/ollama/
/// openrouter/deepseek) is assumed to front.
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub backend_url: String,
    pub api_key: String,
    pub quick_model: String,
    pub deep_model: String,
    pub timeout: Duration,
}

/// HTTP-backed `LlmProvider` speaking the OpenAI chat-completions wire shape.
pub struct HttpLlmProvider {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmProvider {
    pub fn new(config: HttpLlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build llm http client");
        Self { client, config }
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireResponseToolCall>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunctionCall,
}

#[derive(Deserialize)]
struct WireResponseFunctionCall {
    name: String,
    arguments: String,
}

fn to_wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn chat(&self, messages: &[Message], tools: &[ToolSpec], tier: ModelTier) -> LlmResult<Message> {
        let model = match tier {
            ModelTier::Quick => &self.config.quick_model,
            ModelTier::Deep => &self.config.deep_model,
        };

        let wire_messages = messages
            .iter()
            .map(|m| WireMessage {
                role: to_wire_role(m.role),
                content: m.content.clone(),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect();

        let wire_tools = tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        let body = ChatRequestBody {
            model,
            messages: wire_messages,
            tools: wire_tools,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.backend_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LlmError::ServiceUnavailable(format!(
                "llm backend returned {}",
                resp.status()
            )));
        }

        let parsed: ChatResponseBody = resp.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| -> LlmResult<ToolCall> {
                let arguments = serde_json::from_str(&tc.function.arguments)?;
                Ok(ToolCall { id: tc.id, name: tc.function.name, arguments })
            })
            .collect::<LlmResult<Vec<_>>>()?;

        Ok(Message::assistant(choice.message.content.unwrap_or_default(), tool_calls))
    }

    fn quick_model(&self) -> &str {
        &self.config.quick_model
    }

    fn deep_model(&self) -> &str {
        &self.config.deep_model
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
