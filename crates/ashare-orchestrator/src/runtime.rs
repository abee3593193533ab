use std::sync::Arc;

use ashare_core::Message;
use ashare_llm::{LlmProvider, ModelTier, ToolSpec};
use ashare_tools::ToolRegistry;
use tracing::{info, instrument, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::role::AgentRole;

/// Outcome of running a single agent to completion: the final report text
/// plus the messages appended to the shared trail this turn.
pub struct AgentTurnOutcome {
    pub report: String,
    pub appended_messages: Vec<Message>,
    pub used_deep_model: bool,
}

/// Runs one agent's tool-call loop to completion.
///
/// Calls the LLM with the current message list; while the response carries
/// tool calls, dispatches each through `registry`, appends one tool-result
/// entry per call, and loops. Terminates when a response carries no tool
/// calls — that final assistant text is the report. If the role's
/// recursion limit is hit first, the accumulated tool data is handed back to
/// the LLM once more with an instruction to answer directly, and that
/// response becomes the report instead of a hard failure.
#[instrument(skip(llm, registry, base_messages, tool_specs), fields(role = role.name()))]
pub async fn run_agent_turn(
    role: AgentRole,
    llm: &dyn LlmProvider,
    registry: &ToolRegistry,
    base_messages: &[Message],
    tool_specs: &[ToolSpec],
    use_deep_model: bool,
) -> OrchestratorResult<AgentTurnOutcome> {
    let limit = role.recursion_limit();
    let tier = if use_deep_model { ModelTier::Deep } else { ModelTier::Quick };
    let mut messages: Vec<Message> = base_messages.to_vec();
    let mut appended = Vec::new();

    for iteration in 0..limit {
        let response = llm.chat(&messages, tool_specs, tier).await?;

        if !response.has_tool_calls() {
            info!(iteration, "agent turn terminated without tool calls");
            appended.push(response.clone());
            return Ok(AgentTurnOutcome { report: response.content, appended_messages: appended, used_deep_model: use_deep_model });
        }

        appended.push(response.clone());
        messages.push(response.clone());

        for call in &response.tool_calls {
            let envelope = registry.dispatch(&call.name, &call.arguments).await;
            let tool_message = Message::tool(call.id.clone(), envelope.to_agent_content());
            appended.push(tool_message.clone());
            messages.push(tool_message);
        }
    }

    warn!(role = role.name(), limit, "recursion limit reached, forcing direct answer");
    messages.push(Message::user(
        "请基于以上已获取的全部数据，直接给出最终分析结论，不要再调用任何工具。",
    ));
    let final_response = llm.chat(&messages, &[], tier).await?;
    appended.push(final_response.clone());

    if final_response.has_tool_calls() {
        return Err(OrchestratorError::RoleRecursionLimit(limit, role.name().to_string()));
    }

    Ok(AgentTurnOutcome { report: final_response.content, appended_messages: appended, used_deep_model: use_deep_model })
}

/// Builds the tool subset bound to a role from a registry, looked up by name.
pub fn bind_tools(registry: &ToolRegistry, names: &[&str]) -> Vec<ToolSpec> {
    names
        .iter()
        .filter_map(|name| registry.get(name))
        .map(|tool| ToolSpec {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_llm::MockLlmProvider;
    use ashare_tools::{Tool, ToolError};
    use async_trait::async_trait;
    use std::sync::Arc as StdArc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn call(&self, _args: &serde_json::Value) -> Result<String, ToolError> {
            Ok("echoed".to_string())
        }
    }

    #[tokio::test]
    async fn terminates_when_no_tool_calls() {
        let llm = MockLlmProvider::new(vec![Message::assistant("最终报告", vec![])]);
        let registry = ToolRegistry::new();
        let outcome = run_agent_turn(
            AgentRole::MarketAnalyst,
            &llm,
            &registry,
            &[Message::system("sys")],
            &[],
            false,
        )
        .await
        .unwrap();
        assert_eq!(outcome.report, "最终报告");
    }

    #[tokio::test]
    async fn dispatches_tool_calls_before_final_report() {
        use ashare_core::ToolCall;

        let registry = ToolRegistry::new();
        registry.register(StdArc::new(EchoTool));

        let call = ToolCall { id: "1".to_string(), name: "echo".to_string(), arguments: serde_json::json!({}) };
        let llm = MockLlmProvider::new(vec![
            Message::assistant("", vec![call]),
            Message::assistant("基于数据得出结论", vec![]),
        ]);

        let outcome = run_agent_turn(
            AgentRole::MarketAnalyst,
            &llm,
            &registry,
            &[Message::system("sys")],
            &[],
            false,
        )
        .await
        .unwrap();
        assert_eq!(outcome.report, "基于数据得出结论");
        assert!(outcome.appended_messages.iter().any(|m| m.content == "echoed"));
    }
}
