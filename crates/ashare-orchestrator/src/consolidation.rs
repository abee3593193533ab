use std::sync::OnceLock;

use ashare_core::{DecisionRecord, RunState};
use ashare_memory::{DecisionMemoryStore, MemoryError, MemoryMatch};
use ashare_validation::{extract_decision, judge_prior_decision, ExtractedDecision, ReflectionReport, ReflectionVerdict};
use chrono::Utc;
use regex::Regex;

fn decision_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[decision_price:\s*(\d+\.?\d*)\]").unwrap())
}

/// Appends a parseable marker carrying the stock price at the time a
/// decision was recorded, so a later run can recover it without a dedicated
/// schema column. Mirrors the text-block style `recommendation` already
/// uses to carry decision type/confidence/target/stop.
fn encode_decision_price(recommendation: &str, price: f64) -> String {
    format!("{recommendation}\n\n[decision_price: {price:.2}]")
}

fn extract_decision_price(recommendation: &str) -> Option<f64> {
    decision_price_re().captures(recommendation).and_then(|c| c[1].parse().ok())
}

/// Builds the reflection block comparing the latest prior decision on this
/// ticker with `current_price`, or returns an empty string when there is no
/// prior decision (or it carries no recoverable decision price).
pub async fn build_reflection_report(
    memory: &DecisionMemoryStore,
    ticker: &str,
    trade_date: &str,
    current_price: f64,
) -> (String, Option<ReflectionReport>) {
    let prior = match memory.latest_decision_for_ticker(ticker, trade_date).await {
        Ok(Some(p)) => p,
        _ => return (String::new(), None),
    };

    let Some(decision_price) = extract_decision_price(&prior.recommendation) else {
        return (String::new(), None);
    };
    if decision_price <= 0.0 {
        return (String::new(), None);
    }

    let subsequent_return_pct = (current_price - decision_price) / decision_price * 100.0;
    let reflection = judge_prior_decision(prior.decision_type, subsequent_return_pct);

    let verdict_label = match reflection.verdict {
        ReflectionVerdict::Correct => "判断正确",
        ReflectionVerdict::Degraded => "方向未证伪但力度不足",
        ReflectionVerdict::Incorrect => "判断有误",
    };

    let markdown = format!(
        "| 项目 | 数值 |\n|---|---|\n\
         | 决策日期 | {} |\n\
         | 当时决策 | {} (置信度 {:.0}%) |\n\
         | 决策价 | {:.2} |\n\
         | 当前价 | {:.2} |\n\
         | 区间涨跌幅 | {:+.1}% |\n\
         | 复盘结论 | {verdict_label}（评分 {}/10） |\n\n\
         {}",
        prior.decision_date,
        prior.decision_type.signal_token(),
        prior.confidence * 100.0,
        decision_price,
        current_price,
        subsequent_return_pct,
        reflection.score,
        reflection.rationale,
    );

    (markdown, Some(reflection))
}

/// Concatenates the four analyst reports plus a trailing final-decision
/// excerpt — the embedding key the memory store indexes decisions by.
pub fn build_situation_text(state: &RunState) -> String {
    let excerpt: String = state.final_trade_decision.as_deref().unwrap_or("").chars().take(500).collect();
    format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n[决策摘录]\n{excerpt}",
        state.market_report.as_deref().unwrap_or(""),
        state.sentiment_report.as_deref().unwrap_or(""),
        state.news_report.as_deref().unwrap_or(""),
        state.fundamentals_report.as_deref().unwrap_or(""),
    )
}

fn format_recommendation_block(extracted: &ExtractedDecision) -> String {
    fn fmt_opt(v: Option<f64>) -> String {
        v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "—".to_string())
    }
    format!(
        "decision: {}\nconfidence: {:.2}\ntarget_price: {}\nstop_loss: {}\nposition_size_pct: {}",
        extracted.decision_type.signal_token(),
        extracted.confidence,
        fmt_opt(extracted.target_price),
        fmt_opt(extracted.stop_loss),
        extracted.position_size_pct.map(|v| v.to_string()).unwrap_or_else(|| "—".to_string()),
    )
}

/// Parses the final report into a structured decision and writes it to
/// memory under `(ticker, trade_date)`. Memory failures are logged by the
/// caller and never fail the run (§4.2, §7).
pub async fn extract_and_persist_decision(
    memory: &DecisionMemoryStore,
    state: &RunState,
    current_price: f64,
) -> Result<DecisionRecord, MemoryError> {
    let report_text = state
        .consolidation_report
        .as_deref()
        .or(state.final_trade_decision.as_deref())
        .unwrap_or("");
    let extracted = extract_decision(report_text);

    let situation = build_situation_text(state);
    let recommendation = encode_decision_price(&format_recommendation_block(&extracted), current_price);

    let record = DecisionRecord {
        record_id: format!("{}_{}_0", state.ticker, state.trade_date),
        ticker: state.ticker.clone(),
        decision_date: state.trade_date.clone(),
        situation,
        recommendation,
        decision_type: extracted.decision_type,
        confidence: extracted.confidence,
        outcome_updated: false,
        actual_return: None,
        days_held: None,
        outcome_category: None,
        exit_date: None,
        exit_reason: None,
        created_at: Utc::now(),
        outcome_updated_at: None,
        extra_context: Default::default(),
    };

    memory.add_or_update(&record).await?;
    Ok(record)
}

/// Lower-cased action token extracted from the final trade decision
/// Markdown, per §6's `process_signal` contract.
pub fn process_signal(final_trade_decision_markdown: &str) -> String {
    extract_decision(final_trade_decision_markdown).decision_type.signal_token().to_string()
}

pub fn format_lessons_block(successes: &[MemoryMatch], failures: &[MemoryMatch]) -> String {
    if successes.is_empty() && failures.is_empty() {
        return String::new();
    }

    let fmt_list = |items: &[MemoryMatch]| -> String {
        items
            .iter()
            .map(|m| {
                format!(
                    "- [{}] {} 决策（置信度{:.0}%），后续收益{:+.1}%",
                    m.decision_date,
                    m.decision_type.signal_token(),
                    m.confidence * 100.0,
                    m.actual_return.unwrap_or(0.0),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "历史经验参考：\n成功案例：\n{}\n\n失败案例：\n{}\n",
        if successes.is_empty() { "（无）".to_string() } else { fmt_list(successes) },
        if failures.is_empty() { "（无）".to_string() } else { fmt_list(failures) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_core::DecisionType;
    use std::sync::Arc;

    async fn disabled_store() -> DecisionMemoryStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        DecisionMemoryStore::new(pool, None)
    }

    async fn enabled_store() -> DecisionMemoryStore {
        use ashare_memory::HashEmbeddingProvider;
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store = DecisionMemoryStore::new(pool, Some(Arc::new(HashEmbeddingProvider::new(16))));
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn reflection_is_empty_without_prior_decision() {
        let store = disabled_store().await;
        let (md, verdict) = build_reflection_report(&store, "600036", "2024-09-01", 42.0).await;
        assert!(md.is_empty());
        assert!(verdict.is_none());
    }

    #[tokio::test]
    async fn reflection_verdict_correct_for_prior_buy_that_rallied() {
        let store = enabled_store().await;
        let mut state = RunState::new("600036", "2024-06-01");
        state.final_trade_decision = Some("投资评级：【买入】".to_string());
        let recommendation = encode_decision_price("decision: buy\nconfidence: 0.70", 35.0);
        let record = DecisionRecord {
            record_id: "600036_2024-06-01_0".to_string(),
            ticker: "600036".to_string(),
            decision_date: "2024-06-01".to_string(),
            situation: "situation".to_string(),
            recommendation,
            decision_type: DecisionType::Buy,
            confidence: 0.7,
            outcome_updated: false,
            actual_return: None,
            days_held: None,
            outcome_category: None,
            exit_date: None,
            exit_reason: None,
            created_at: Utc::now(),
            outcome_updated_at: None,
            extra_context: Default::default(),
        };
        store.add_or_update(&record).await.unwrap();

        let (md, verdict) = build_reflection_report(&store, "600036", "2024-09-01", 42.0).await;
        assert!(!md.is_empty());
        assert_eq!(verdict.unwrap().verdict, ReflectionVerdict::Correct);
    }

    #[tokio::test]
    async fn decision_extraction_round_trips_signal_token() {
        let report = "投资评级：【买入】 目标价: 45.50 止损价: 38.00 建议仓位: 30% 置信度: 75%";
        assert_eq!(process_signal(report), "buy");
    }
}
