use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ashare_core::{Message, RunState};
use ashare_debate::{
    apply_investment_turn, apply_risk_turn, format_rebuttal_section, next_investment_turn, next_risk_turn,
    InvestmentSpeaker, InvestmentTurn, RiskTurn,
};
use ashare_llm::LlmProvider;
use ashare_memory::DecisionMemoryStore;
use ashare_tools::{tool_names_for_role, ToolRegistry};
use ashare_validation::{format_validation_warnings, validate_valuation_report, DailyBasicStats};
use tracing::{info, instrument, warn};

use crate::consolidation::{build_reflection_report, extract_and_persist_decision};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::role::AgentRole;
use crate::runtime::{bind_tools, run_agent_turn};

/// Run-scoped knobs for a single graph traversal (§4.3, §4.5).
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub max_debate_rounds: u32,
    pub max_risk_discuss_rounds: u32,
    pub max_recur_limit: u32,
    pub enable_china_market_analyst: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_debate_rounds: 1,
            max_risk_discuss_rounds: 1,
            max_recur_limit: 100,
            enable_china_market_analyst: false,
        }
    }
}

/// External collaborators a graph run needs: an LLM, a tool registry, the
/// decision memory store, and a cooperative cancellation flag.
pub struct GraphDeps<'a> {
    pub llm: &'a dyn LlmProvider,
    pub registry: &'a ToolRegistry,
    pub memory: &'a DecisionMemoryStore,
    pub cancel: Arc<AtomicBool>,
}

/// Callback invoked with each state snapshot as soon as it is produced, so a
/// caller can surface live progress and persist partial artifacts even if a
/// later node fails or the run is cancelled.
pub type SnapshotSink<'a> = dyn FnMut(&RunState) + Send + 'a;

/// Counts node executions against `max_recur_limit`, the graph-wide ceiling
/// separate from each individual role's own recursion tier.
struct RecursionGuard {
    remaining: u32,
}

impl RecursionGuard {
    fn new(limit: u32) -> Self {
        Self { remaining: limit }
    }

    fn tick(&mut self) -> OrchestratorResult<()> {
        if self.remaining == 0 {
            return Err(OrchestratorError::GraphRecursionLimit(self.remaining as usize));
        }
        self.remaining -= 1;
        Ok(())
    }
}

fn check_cancelled(deps: &GraphDeps<'_>) -> OrchestratorResult<()> {
    if deps.cancel.load(Ordering::SeqCst) {
        return Err(OrchestratorError::Cancelled);
    }
    Ok(())
}

fn record(state: &RunState, snapshots: &mut Vec<RunState>, on_snapshot: &mut SnapshotSink<'_>) {
    snapshots.push(state.clone());
    on_snapshot(state);
}

pub fn create_initial_state(ticker: &str, trade_date: &str) -> RunState {
    RunState::new(ticker, trade_date)
}

/// Runs the full analysis graph to completion, yielding a `RunState`
/// snapshot after every node so a caller (the run controller) can surface
/// live progress. `on_snapshot` fires synchronously with each snapshot, even
/// along a path that later fails or is cancelled — the only way a caller
/// observes partial artifacts from a run that does not reach `END`.
#[instrument(skip_all, fields(ticker = %state.ticker, trade_date = %state.trade_date))]
pub async fn stream_analysis(
    mut state: RunState,
    deps: &GraphDeps<'_>,
    config: &GraphConfig,
    mut on_snapshot: impl FnMut(&RunState) + Send,
) -> OrchestratorResult<Vec<RunState>> {
    let mut snapshots = Vec::new();
    let mut guard = RecursionGuard::new(config.max_recur_limit);
    let sink: &mut SnapshotSink<'_> = &mut on_snapshot;

    run_analyst_chain(&mut state, deps, config, &mut guard, &mut snapshots, sink).await?;
    run_investment_debate(&mut state, deps, config, &mut guard, &mut snapshots, sink).await?;
    run_research_manager(&mut state, deps, &mut guard, &mut snapshots, sink).await?;
    run_trader(&mut state, deps, &mut guard, &mut snapshots, sink).await?;
    run_risk_debate(&mut state, deps, config, &mut guard, &mut snapshots, sink).await?;
    run_risk_judge(&mut state, deps, &mut guard, &mut snapshots, sink).await?;
    run_consolidation(&mut state, deps, &mut guard, &mut snapshots, sink).await?;

    Ok(snapshots)
}

async fn run_single_analyst(
    role: AgentRole,
    state: &RunState,
    deps: &GraphDeps<'_>,
) -> OrchestratorResult<String> {
    let today = state.trade_date.clone();
    let system_prompt = role.render_system_prompt(&today, &state.ticker, ashare_tools_joined(role, deps.registry).as_str());
    let tool_names = tool_names_for_role(role.name());
    let tool_specs = bind_tools(deps.registry, tool_names);
    let messages = vec![Message::system(system_prompt), Message::user(format!("请分析 {}", state.ticker))];

    let outcome = run_agent_turn(role, deps.llm, deps.registry, &messages, &tool_specs, false).await?;
    Ok(outcome.report)
}

/// Pulls the `close` figure back out of `get_market_data`'s rendered
/// `| field | value |` table (§6 wire format), for feeding the reflection
/// pipeline a real current price instead of a placeholder. Returns `0.0`
/// (reflection's own no-op sentinel) if the market report is absent or the
/// row can't be parsed.
fn extract_current_price(market_report: Option<&str>) -> f64 {
    let Some(report) = market_report else { return 0.0 };
    for line in report.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = trimmed.trim_matches('|').split('|').map(str::trim).collect();
        if cells.len() == 2 && cells[0].eq_ignore_ascii_case("close") {
            return cells[1].parse().unwrap_or(0.0);
        }
    }
    0.0
}

fn ashare_tools_joined(role: AgentRole, registry: &ToolRegistry) -> String {
    let names = tool_names_for_role(role.name());
    if names.is_empty() {
        registry.tool_names().join(", ")
    } else {
        names.join(", ")
    }
}

/// Sequential analyst chain (market -> sentiment -> news -> fundamentals ->
/// optional China-market regime), per the Open Question resolution recorded
/// in SPEC_FULL.md: each analyst's report is available to the next, not run
/// in parallel.
async fn run_analyst_chain(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    config: &GraphConfig,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    check_cancelled(deps)?;
    guard.tick()?;
    state.market_report = Some(run_single_analyst(AgentRole::MarketAnalyst, state, deps).await?);
    record(state, snapshots, on_snapshot);

    check_cancelled(deps)?;
    guard.tick()?;
    state.sentiment_report = Some(run_single_analyst(AgentRole::SentimentAnalyst, state, deps).await?);
    record(state, snapshots, on_snapshot);

    check_cancelled(deps)?;
    guard.tick()?;
    state.news_report = Some(run_single_analyst(AgentRole::NewsAnalyst, state, deps).await?);
    record(state, snapshots, on_snapshot);

    check_cancelled(deps)?;
    guard.tick()?;
    let fundamentals = run_single_analyst(AgentRole::FundamentalsAnalyst, state, deps).await?;
    let validation = validate_valuation_report(&fundamentals, 0.0, &DailyBasicStats::default());
    let warnings = format_validation_warnings(&validation);
    state.fundamentals_report = Some(if warnings.is_empty() { fundamentals } else { format!("{fundamentals}\n\n{warnings}") });
    record(state, snapshots, on_snapshot);

    if config.enable_china_market_analyst {
        check_cancelled(deps)?;
        guard.tick()?;
        state.china_market_report = Some(run_single_analyst(AgentRole::ChinaMarketAnalyst, state, deps).await?);
        record(state, snapshots, on_snapshot);
    }

    info!("analyst chain complete");
    Ok(())
}

fn analyst_context(state: &RunState) -> String {
    format!(
        "市场报告：\n{}\n\n情绪报告：\n{}\n\n新闻报告：\n{}\n\n基本面报告：\n{}\n",
        state.market_report.as_deref().unwrap_or(""),
        state.sentiment_report.as_deref().unwrap_or(""),
        state.news_report.as_deref().unwrap_or(""),
        state.fundamentals_report.as_deref().unwrap_or(""),
    )
}

async fn run_debater_turn(role: AgentRole, state: &RunState, history_prompt: &str, deps: &GraphDeps<'_>) -> OrchestratorResult<String> {
    let today = state.trade_date.clone();
    let system_prompt = role.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!("{}\n\n辩论历史：\n{}", analyst_context(state), history_prompt)),
    ];
    let outcome = run_agent_turn(role, deps.llm, deps.registry, &messages, &[], false).await?;
    Ok(outcome.report)
}

/// Bull/bear investment debate, alternating turns until
/// `next_investment_turn` reports `Done`.
async fn run_investment_debate(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    config: &GraphConfig,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    loop {
        check_cancelled(deps)?;
        match next_investment_turn(&state.investment_debate_state, config.max_debate_rounds) {
            InvestmentTurn::Done => break,
            InvestmentTurn::Bull => {
                guard.tick()?;
                let rebuttal = format_rebuttal_section(&state.investment_debate_state.pending_rebuttals, "空方");
                let prompt = format!("{}\n{rebuttal}", state.investment_debate_state.history);
                let response = run_debater_turn(AgentRole::BullResearcher, state, &prompt, deps).await?;
                apply_investment_turn(&mut state.investment_debate_state, InvestmentSpeaker::Bull, &response);
            }
            InvestmentTurn::Bear => {
                guard.tick()?;
                let rebuttal = format_rebuttal_section(&state.investment_debate_state.pending_rebuttals, "多方");
                let prompt = format!("{}\n{rebuttal}", state.investment_debate_state.history);
                let response = run_debater_turn(AgentRole::BearResearcher, state, &prompt, deps).await?;
                apply_investment_turn(&mut state.investment_debate_state, InvestmentSpeaker::Bear, &response);
            }
        }
        record(state, snapshots, on_snapshot);
    }
    Ok(())
}

async fn run_research_manager(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    check_cancelled(deps)?;
    guard.tick()?;
    let today = state.trade_date.clone();
    let system_prompt = AgentRole::ResearchManager.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!("{}\n\n完整辩论记录：\n{}", analyst_context(state), state.investment_debate_state.history)),
    ];
    let outcome = run_agent_turn(AgentRole::ResearchManager, deps.llm, deps.registry, &messages, &[], true).await?;
    state.investment_debate_state.judge_decision = outcome.report;
    record(state, snapshots, on_snapshot);
    Ok(())
}

/// Trader stage. Per the Open Question resolution recorded in
/// SPEC_FULL.md, the trader sees the full run state (all analyst reports
/// plus the judge's verdict), not just the verdict in isolation.
async fn run_trader(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    check_cancelled(deps)?;
    guard.tick()?;

    let reflection = if !state.previous_decision_reflection.is_empty() {
        state.previous_decision_reflection.clone()
    } else {
        let current_price = extract_current_price(state.market_report.as_deref());
        let (markdown, _) = build_reflection_report(deps.memory, &state.ticker, &state.trade_date, current_price).await;
        state.previous_decision_reflection = markdown.clone();
        markdown
    };

    let today = state.trade_date.clone();
    let system_prompt = AgentRole::Trader.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!(
            "{}\n\n投资决策委员会结论：\n{}\n\n历史复盘：\n{reflection}",
            analyst_context(state),
            state.investment_debate_state.judge_decision,
        )),
    ];
    let outcome = run_agent_turn(AgentRole::Trader, deps.llm, deps.registry, &messages, &[], false).await?;
    state.trader_investment_plan = Some(outcome.report);
    record(state, snapshots, on_snapshot);
    Ok(())
}

async fn run_risk_debater_turn(role: AgentRole, state: &RunState, deps: &GraphDeps<'_>) -> OrchestratorResult<String> {
    let today = state.trade_date.clone();
    let system_prompt = role.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!(
            "交易计划：\n{}\n\n风险委员会历史：\n{}",
            state.trader_investment_plan.as_deref().unwrap_or(""),
            state.risk_debate_state.history,
        )),
    ];
    let outcome = run_agent_turn(role, deps.llm, deps.registry, &messages, &[], false).await?;
    Ok(outcome.report)
}

/// Three-way risk committee debate (momentum/value/risk-manager rotation).
async fn run_risk_debate(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    config: &GraphConfig,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    loop {
        check_cancelled(deps)?;
        let turn = next_risk_turn(&state.risk_debate_state, config.max_risk_discuss_rounds);
        let speaker = match turn {
            RiskTurn::Done => break,
            RiskTurn::Speak(speaker) => speaker,
        };
        guard.tick()?;

        let role = match speaker {
            ashare_core::RiskSpeaker::Momentum => AgentRole::MomentumDebater,
            ashare_core::RiskSpeaker::Value => AgentRole::ValueDebater,
            ashare_core::RiskSpeaker::RiskManager => AgentRole::RiskManagerDebater,
        };
        let response = run_risk_debater_turn(role, state, deps).await?;
        apply_risk_turn(&mut state.risk_debate_state, speaker, &response);
        record(state, snapshots, on_snapshot);
    }
    Ok(())
}

async fn run_risk_judge(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    check_cancelled(deps)?;
    guard.tick()?;
    let today = state.trade_date.clone();
    let system_prompt = AgentRole::RiskJudge.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!(
            "交易计划：\n{}\n\n风险辩论完整记录：\n{}",
            state.trader_investment_plan.as_deref().unwrap_or(""),
            state.risk_debate_state.history,
        )),
    ];
    let outcome = run_agent_turn(AgentRole::RiskJudge, deps.llm, deps.registry, &messages, &[], true).await?;
    state.risk_debate_state.judge_decision = outcome.report.clone();
    state.final_trade_decision = Some(outcome.report);
    record(state, snapshots, on_snapshot);
    Ok(())
}

/// Consolidation: renders the final report, extracts a structured
/// decision, and persists it to memory (failures here are logged, not
/// fatal — memory is a convenience, not a correctness requirement).
async fn run_consolidation(
    state: &mut RunState,
    deps: &GraphDeps<'_>,
    guard: &mut RecursionGuard,
    snapshots: &mut Vec<RunState>,
    on_snapshot: &mut SnapshotSink<'_>,
) -> OrchestratorResult<()> {
    check_cancelled(deps)?;
    guard.tick()?;
    let today = state.trade_date.clone();
    let system_prompt = AgentRole::ConsolidationAnalyst.render_system_prompt(&today, &state.ticker, "");
    let messages = vec![
        Message::system(system_prompt),
        Message::user(format!(
            "{}\n\n交易计划：\n{}\n\n最终风险裁决：\n{}\n\n历史复盘：\n{}",
            analyst_context(state),
            state.trader_investment_plan.as_deref().unwrap_or(""),
            state.final_trade_decision.as_deref().unwrap_or(""),
            state.previous_decision_reflection,
        )),
    ];
    let outcome = run_agent_turn(AgentRole::ConsolidationAnalyst, deps.llm, deps.registry, &messages, &[], true).await?;
    state.consolidation_report = Some(outcome.report);

    let current_price = extract_current_price(state.market_report.as_deref());
    if let Err(err) = extract_and_persist_decision(deps.memory, state, current_price).await {
        warn!(error = %err, "failed to persist decision to memory, continuing without it");
    }

    record(state, snapshots, on_snapshot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_core::Message as CoreMessage;
    use ashare_llm::MockLlmProvider;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc as StdArc;

    async fn disabled_memory() -> DecisionMemoryStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        DecisionMemoryStore::new(pool, None)
    }

    fn scripted(n: usize) -> MockLlmProvider {
        let messages = (0..n).map(|i| CoreMessage::assistant(format!("报告{i}"), vec![])).collect();
        MockLlmProvider::new(messages)
    }

    #[test]
    fn extract_current_price_reads_close_row() {
        let report = "## Market data for 600036 (2024-06-01)\n\n| field | value |\n|---|---|\n| close | 12.34 |\n| volume | 1200000.00 |\n";
        assert_eq!(extract_current_price(Some(report)), 12.34);
    }

    #[test]
    fn extract_current_price_defaults_to_zero_when_missing() {
        assert_eq!(extract_current_price(None), 0.0);
        assert_eq!(extract_current_price(Some("no table here")), 0.0);
    }

    #[tokio::test]
    async fn graph_runs_end_to_end_with_single_debate_round() {
        let memory = disabled_memory().await;
        let registry = ashare_tools::default_registry();
        // analyst chain (4) + bull/bear (2) + manager (1) + trader (1) +
        // risk debate (3) + risk judge (1) + consolidation (1) = 13 calls.
        let llm = scripted(13);
        let cancel = StdArc::new(AtomicBool::new(false));
        let deps = GraphDeps { llm: &llm, registry: &registry, memory: &memory, cancel };
        let config = GraphConfig::default();
        let state = create_initial_state("600036", "2024-06-01");

        let snapshot_count = StdArc::new(AtomicUsize::new(0));
        let counter = snapshot_count.clone();
        let snapshots = stream_analysis(state, &deps, &config, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        let last = snapshots.last().unwrap();
        assert!(last.consolidation_report.is_some());
        assert_eq!(last.investment_debate_state.count, 2);
        assert_eq!(last.risk_debate_state.count, 3);
        assert_eq!(snapshot_count.load(Ordering::SeqCst), snapshots.len());
    }

    #[tokio::test]
    async fn graph_stops_immediately_when_cancelled() {
        let memory = disabled_memory().await;
        let registry = ashare_tools::default_registry();
        let llm = scripted(1);
        let cancel = StdArc::new(AtomicBool::new(true));
        let deps = GraphDeps { llm: &llm, registry: &registry, memory: &memory, cancel };
        let config = GraphConfig::default();
        let state = create_initial_state("600036", "2024-06-01");

        let err = stream_analysis(state, &deps, &config, |_| {}).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_mid_chain_still_surfaces_partial_snapshots_via_callback() {
        let memory = disabled_memory().await;
        let registry = ashare_tools::default_registry();
        let llm = scripted(1);
        let cancel = StdArc::new(AtomicBool::new(false));
        let flag_for_llm_side_effect = cancel.clone();
        let deps = GraphDeps { llm: &llm, registry: &registry, memory: &memory, cancel };
        let config = GraphConfig::default();
        let state = create_initial_state("600036", "2024-06-01");

        let seen = StdArc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let result = stream_analysis(state, &deps, &config, move |snap| {
            seen_clone.lock().unwrap().push(snap.market_report.clone());
            flag_for_llm_side_effect.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(result.is_err());
        let observed = seen.lock().unwrap();
        assert_eq!(observed.len(), 1);
        assert!(observed[0].is_some());
    }
}
