use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Daily-basic valuation statistics consumed by the validation checks.
/// Mirrors the per-ticker valuation snapshot a market-data tool response
/// would carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyBasicStats {
    pub pe_min: Option<f64>,
    pub pe_median: Option<f64>,
    pub pb_median: Option<f64>,
    pub bps: Option<f64>,
    pub eps: Option<f64>,
    pub current_pe: Option<f64>,
    pub current_yield_pct: Option<f64>,
    pub industry: Option<String>,
    pub recent_dividend_per_share: Option<f64>,
    pub reported_yield_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationDecision {
    pub target_multiple_range: Option<(f64, f64)>,
    pub current_multiple: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationReport {
    pub passed: bool,
    pub warnings: Vec<String>,
    pub recommended_pe: Option<f64>,
}

fn valuation_decision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"target_multiple_range["\s:]+\[?\s*(\d+\.?\d*)\s*[,\-]\s*(\d+\.?\d*)"#).unwrap())
}

fn current_multiple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"current_multiple["\s:]+(\d+\.?\d*)"#).unwrap())
}

fn target_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"目标价[：:\s]*(\d+\.?\d*)\s*元").unwrap())
}

/// Best-effort extraction of the JSON-ish `valuation_decision` block a
/// fundamentals report is expected to emit.
pub fn extract_valuation_decision(report: &str) -> Option<ValuationDecision> {
    let mut decision = ValuationDecision::default();
    if let Some(caps) = valuation_decision_re().captures(report) {
        let lo: f64 = caps[1].parse().ok()?;
        let hi: f64 = caps[2].parse().ok()?;
        decision.target_multiple_range = Some((lo, hi));
    }
    if let Some(caps) = current_multiple_re().captures(report) {
        decision.current_multiple = caps[1].parse().ok();
    }
    if decision.target_multiple_range.is_none() && decision.current_multiple.is_none() {
        return None;
    }
    Some(decision)
}

pub fn extract_target_price(report: &str) -> Option<f64> {
    target_price_re().captures(report).and_then(|c| c[1].parse().ok())
}

/// Industries for which dividend-validity checks always apply, regardless of
/// current yield.
const DIVIDEND_ALWAYS_CHECKED_INDUSTRIES: &[&str] = &["utilities", "banks", "highways", "ports", "reits"];

pub fn is_high_dividend_stock(industry: Option<&str>, current_yield_pct: Option<f64>) -> bool {
    if let Some(ind) = industry {
        if DIVIDEND_ALWAYS_CHECKED_INDUSTRIES.contains(&ind.to_lowercase().as_str()) {
            return true;
        }
    }
    current_yield_pct.map(|y| y > 3.0).unwrap_or(false)
}

/// Runs the PE range / PE consistency / PB cross-check / dividend-validity
/// checks over a fundamentals report, returning a warning list. Never
/// terminal: callers append the warnings as a "Data Consistency Warnings"
/// section rather than aborting.
pub fn validate_valuation_report(fundamentals_report: &str, current_price: f64, stats: &DailyBasicStats) -> ValuationReport {
    let mut warnings = Vec::new();
    let mut recommended_pe = None;

    let decision = extract_valuation_decision(fundamentals_report);

    // PE range check
    if let (Some(d), Some(pe_min)) = (&decision, stats.pe_min) {
        if let Some((lo, _hi)) = d.target_multiple_range {
            if lo < pe_min {
                warnings.push(format!(
                    "⚠️ PE区间下限({lo:.1}倍)低于历史最小值({pe_min:.1}倍)，等于假设市场给出史无前例的低估值"
                ));
            }
        }
    }

    // PE consistency check
    if let (Some(eps), true) = (stats.eps, current_price > 0.0) {
        if eps > 0.0 {
            let calculated_pe = current_price / eps;
            if let Some(reported_pe) = decision.as_ref().and_then(|d| d.current_multiple).filter(|p| *p > 0.0) {
                let error_vs_reported = (calculated_pe - reported_pe).abs() / reported_pe;
                if error_vs_reported > 0.10 {
                    warnings.push(format!(
                        "⚠️ PE数学矛盾：股价{current_price}元 ÷ EPS{eps}元 = {calculated_pe:.1}倍，但报告标注{reported_pe}倍（误差{:.0}%），建议使用计算值",
                        error_vs_reported * 100.0
                    ));
                    recommended_pe = Some((calculated_pe * 100.0).round() / 100.0);
                } else if error_vs_reported > 0.05 {
                    recommended_pe = Some((calculated_pe * 100.0).round() / 100.0);
                }
            }
        }
    }

    // PB cross-check
    if let (Some(bps), Some(pb_median)) = (stats.bps, stats.pb_median) {
        if bps > 0.0 && pb_median > 0.0 && current_price > 0.0 {
            let pb_target = bps * pb_median;
            if let Some(pe_target) = extract_target_price(fundamentals_report) {
                let pe_upside = (pe_target - current_price) / current_price * 100.0;
                let pb_upside = (pb_target - current_price) / current_price * 100.0;
                let diff_pct = (pe_upside - pb_upside).abs();
                if diff_pct > 30.0 {
                    warnings.push(format!(
                        "⚠️ 估值重大分歧：PE目标价{pe_target:.2}元(较现价{pe_upside:+.0}%) vs PB目标价{pb_target:.2}元(较现价{pb_upside:+.0}%)，差异{diff_pct:.0}个百分点"
                    ));
                }
            }
        }
    }

    // Dividend validity
    if is_high_dividend_stock(stats.industry.as_deref(), stats.current_yield_pct) {
        if let (Some(recent_div), Some(reported_yield)) = (stats.recent_dividend_per_share, stats.reported_yield_pct) {
            if current_price > 0.0 {
                let computed_yield = recent_div / current_price * 100.0;
                if reported_yield > 0.0 {
                    let diff = (computed_yield - reported_yield).abs() / reported_yield;
                    if diff > 0.15 {
                        warnings.push(format!(
                            "⚠️ 股息率矛盾：TTM股息{recent_div}元 ÷ 现价{current_price}元 = {computed_yield:.2}%，但报告标注{reported_yield:.2}%（误差{:.0}%）",
                            diff * 100.0
                        ));
                    }
                }
            }
        }
    }

    ValuationReport { passed: warnings.is_empty(), warnings, recommended_pe }
}

/// Scores a single claimed "hot concept" into the three-tier relevance
/// bucket the news analyst's claims are cross-checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConceptEvidence {
    OfficialClassification,
    InvestorQaOrAnnouncement,
    MarketAssociationOnly,
}

pub fn score_concept_relevance(evidence: ConceptEvidence) -> (u8, u8, &'static str) {
    match evidence {
        ConceptEvidence::OfficialClassification => (50, 100, "official industry classification"),
        ConceptEvidence::InvestorQaOrAnnouncement => (20, 49, "mentioned only in investor-Q&A or public announcements"),
        ConceptEvidence::MarketAssociationOnly => (0, 19, "pure market association"),
    }
}

/// Formats `warnings` under the "Data Consistency Warnings" section header,
/// returning an empty string when there is nothing to report.
pub fn format_validation_warnings(report: &ValuationReport) -> String {
    if report.passed || report.warnings.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "## ⚠️ 数据一致性警告\n".to_string(),
        "以下问题在自动验证中被检测到，请人工复核：\n".to_string(),
    ];
    for (i, warning) in report.warnings.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, warning));
    }
    lines.push("\n---\n".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pe_range_violation_warns() {
        let report = r#"{"valuation_decision": {"target_multiple_range": [8, 15], "current_multiple": 12}}"#;
        let stats = DailyBasicStats { pe_min: Some(10.0), ..Default::default() };
        let result = validate_valuation_report(report, 100.0, &stats);
        assert!(!result.passed);
        assert!(result.warnings[0].contains("低于历史最小值"));
    }

    #[test]
    fn pe_consistency_over_10pct_warns_and_recommends() {
        let report = r#"{"valuation_decision": {"current_multiple": 20}}"#;
        let stats = DailyBasicStats { eps: Some(5.0), ..Default::default() };
        // calculated pe = 100/5 = 20, matches, no warning
        let result = validate_valuation_report(report, 100.0, &stats);
        assert!(result.passed);

        let report2 = r#"{"valuation_decision": {"current_multiple": 30}}"#;
        let result2 = validate_valuation_report(report2, 100.0, &stats);
        assert!(!result2.passed);
        assert_eq!(result2.recommended_pe, Some(20.0));
    }

    #[test]
    fn pe_consistency_5_to_10pct_sets_recommended_without_warning() {
        let report = r#"{"valuation_decision": {"current_multiple": 21.5}}"#;
        let stats = DailyBasicStats { eps: Some(5.0), ..Default::default() };
        let result = validate_valuation_report(report, 100.0, &stats);
        assert!(result.passed);
        assert_eq!(result.recommended_pe, Some(20.0));
    }

    #[test]
    fn pb_cross_check_flags_large_divergence() {
        let report = "目标价：150元";
        let stats = DailyBasicStats { bps: Some(20.0), pb_median: Some(4.0), ..Default::default() };
        // pb_target = 80, current=100: pb_upside=-20%, pe target 150 upside=+50%, diff=70
        let result = validate_valuation_report(report, 100.0, &stats);
        assert!(!result.passed);
    }

    #[test]
    fn high_dividend_stock_by_industry() {
        assert!(is_high_dividend_stock(Some("banks"), None));
        assert!(is_high_dividend_stock(Some("Banks"), None));
        assert!(is_high_dividend_stock(None, Some(3.5)));
        assert!(!is_high_dividend_stock(Some("technology"), Some(1.0)));
    }
}
