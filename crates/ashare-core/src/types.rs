use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a single entry in the shared message trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by an assistant message, before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One entry in the shared message trail threaded through the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Present on `Role::Tool` entries: the id of the `ToolCall` this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls, tool_call_id: None }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Two-player (bull/bear) investment debate state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentDebateState {
    pub history: String,
    pub bull_history: String,
    pub bear_history: String,
    pub current_response: String,
    pub count: u32,
    pub bull_claims: Vec<String>,
    pub bear_claims: Vec<String>,
    pub pending_rebuttals: Vec<String>,
    pub addressed_claims: Vec<String>,
    pub judge_decision: String,
}

/// Which of the three risk-debate seats produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSpeaker {
    Momentum,
    Value,
    RiskManager,
}

impl RiskSpeaker {
    /// Rotation order: momentum -> value -> risk-manager -> momentum ...
    pub fn next(self) -> Self {
        match self {
            RiskSpeaker::Momentum => RiskSpeaker::Value,
            RiskSpeaker::Value => RiskSpeaker::RiskManager,
            RiskSpeaker::RiskManager => RiskSpeaker::Momentum,
        }
    }
}

/// Three-player (momentum/value/risk-manager) risk-committee debate state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDebateState {
    pub history: String,
    pub momentum_history: String,
    pub value_history: String,
    pub risk_manager_history: String,
    pub current_momentum_response: String,
    pub current_value_response: String,
    pub current_risk_manager_response: String,
    pub latest_speaker: Option<RiskSpeaker>,
    pub count: u32,
    pub judge_decision: String,
}

/// The single mapping carried through the analysis graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub ticker: String,
    pub trade_date: String,
    pub messages: Vec<Message>,

    pub market_report: Option<String>,
    pub sentiment_report: Option<String>,
    pub news_report: Option<String>,
    pub fundamentals_report: Option<String>,
    pub china_market_report: Option<String>,

    pub investment_debate_state: InvestmentDebateState,
    pub trader_investment_plan: Option<String>,
    pub risk_debate_state: RiskDebateState,
    pub final_trade_decision: Option<String>,
    pub consolidation_report: Option<String>,
    pub previous_decision_reflection: String,

    pub sender: Option<String>,
}

impl RunState {
    pub fn new(ticker: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            trade_date: trade_date.into(),
            ..Default::default()
        }
    }
}

/// Discrete action label attached to a decision record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    StrongBuy,
    Buy,
    Hold,
    Reduce,
    Sell,
    StrongSell,
}

impl DecisionType {
    /// Default confidence assigned when the report doesn't state one explicitly.
    pub fn default_confidence(self) -> f64 {
        match self {
            DecisionType::StrongBuy | DecisionType::StrongSell => 0.9,
            DecisionType::Buy | DecisionType::Sell => 0.7,
            DecisionType::Reduce => 0.6,
            DecisionType::Hold => 0.5,
        }
    }

    /// Lower-cased action token, as returned by `process_signal`.
    pub fn signal_token(self) -> &'static str {
        match self {
            DecisionType::StrongBuy => "strong_buy",
            DecisionType::Buy => "buy",
            DecisionType::Hold => "hold",
            DecisionType::Reduce => "reduce",
            DecisionType::Sell => "sell",
            DecisionType::StrongSell => "strong_sell",
        }
    }
}

/// Realised result bucket for a decision, derived from `actual_return`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Profit,
    Loss,
    Breakeven,
}

impl OutcomeCategory {
    /// profit if > 0.5%, loss if < -0.5%, breakeven otherwise.
    pub fn from_return(actual_return_pct: f64) -> Self {
        if actual_return_pct > 0.5 {
            OutcomeCategory::Profit
        } else if actual_return_pct < -0.5 {
            OutcomeCategory::Loss
        } else {
            OutcomeCategory::Breakeven
        }
    }
}

/// A persisted `(situation -> recommendation -> outcome)` triple, keyed by
/// `(ticker, decision_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub record_id: String,
    pub ticker: String,
    pub decision_date: String,

    pub situation: String,
    pub recommendation: String,

    pub decision_type: DecisionType,
    pub confidence: f64,

    pub outcome_updated: bool,
    pub actual_return: Option<f64>,
    pub days_held: Option<u32>,
    pub outcome_category: Option<OutcomeCategory>,
    pub exit_date: Option<String>,
    pub exit_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub outcome_updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub extra_context: HashMap<String, serde_json::Value>,
}
