use ashare_core::DecisionType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDecision {
    pub decision_type: DecisionType,
    pub confidence: f64,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub position_size_pct: Option<u32>,
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"置信度[：:]\s*(\d+\.?\d*)%").unwrap())
}

fn target_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"目标价[:：]\s*(\d+\.?\d*)").unwrap())
}

fn stop_loss_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"止损价[:：]\s*(\d+\.?\d*)").unwrap())
}

fn position_size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"建议仓位[:：]\s*(\d+)%").unwrap())
}

fn extract_decision_type(text: &str) -> DecisionType {
    if text.contains("强烈买入") || text.contains("STRONG_BUY") {
        return DecisionType::StrongBuy;
    }
    if text.contains("强烈卖出") || text.contains("STRONG_SELL") {
        return DecisionType::StrongSell;
    }
    if text.contains("买入") || text.contains("BUY") {
        return DecisionType::Buy;
    }
    if text.contains("卖出") || text.contains("SELL") {
        return DecisionType::Sell;
    }
    if text.contains("减持") || text.contains("REDUCE") {
        return DecisionType::Reduce;
    }
    if text.contains("持有") || text.contains("HOLD") {
        return DecisionType::Hold;
    }
    DecisionType::Hold
}

/// Parses a consolidation report (or, failing that, the final trade
/// decision text) into a structured decision record. `decision_type` search
/// order is Chinese markers first (longer/more-specific markers before their
/// substrings, e.g. 强烈买入 before 买入), then the English tokens; default
/// HOLD when nothing matches.
pub fn extract_decision(report: &str) -> ExtractedDecision {
    let decision_type = extract_decision_type(report);

    let confidence = confidence_re()
        .captures(report)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|pct| pct / 100.0)
        .unwrap_or_else(|| decision_type.default_confidence());

    let target_price = target_price_re().captures(report).and_then(|c| c[1].parse().ok());
    let stop_loss = stop_loss_re().captures(report).and_then(|c| c[1].parse().ok());
    let position_size_pct = position_size_re().captures(report).and_then(|c| c[1].parse().ok());

    ExtractedDecision { decision_type, confidence, target_price, stop_loss, position_size_pct }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_buy_matched_before_plain_buy() {
        let report = "综合评级：强烈买入。目标价：85.5元，止损价：70元，建议仓位：30%";
        let decision = extract_decision(report);
        assert_eq!(decision.decision_type, DecisionType::StrongBuy);
        assert_eq!(decision.target_price, Some(85.5));
        assert_eq!(decision.stop_loss, Some(70.0));
        assert_eq!(decision.position_size_pct, Some(30));
        assert!((decision.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn explicit_confidence_overrides_default() {
        let report = "评级：买入。置信度: 82%";
        let decision = extract_decision(report);
        assert_eq!(decision.decision_type, DecisionType::Buy);
        assert!((decision.confidence - 0.82).abs() < 1e-9);
    }

    #[test]
    fn no_match_defaults_to_hold() {
        let decision = extract_decision("报告文本中没有任何明确评级词汇");
        assert_eq!(decision.decision_type, DecisionType::Hold);
        assert!((decision.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn english_tokens_are_recognized() {
        let decision = extract_decision("Rating: REDUCE position given elevated valuation");
        assert_eq!(decision.decision_type, DecisionType::Reduce);
    }
}
