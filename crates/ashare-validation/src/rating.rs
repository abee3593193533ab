use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    Unclear,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::StrongBuy => "强烈买入",
            Rating::Buy => "买入",
            Rating::Hold => "观望",
            Rating::Sell => "卖出",
            Rating::Unclear => "未明确",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalsRating {
    pub rating: Rating,
    pub target_price: Option<f64>,
    pub risk_reward_ratio: Option<f64>,
    pub core_finding: String,
}

fn risk_reward_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:盈亏比|风险收益比)[：:\s]*约?([\d.]+)").unwrap())
}

fn target_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:目标价|加权目标价|中性目标价)[：:\s]*([\d.]+)").unwrap())
}

fn current_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"当前[股]?价[：:\s]*([\d.]+)").unwrap())
}

/// Extracts a rating and supporting fields from a fundamentals report,
/// following the risk/reward-ratio tiers and falling back to upside-from-
/// target-price tiers when no ratio is stated.
pub fn extract_rating_from_fundamentals_report(report: &str) -> FundamentalsRating {
    if report.is_empty() {
        return FundamentalsRating {
            rating: Rating::Unclear,
            target_price: None,
            risk_reward_ratio: None,
            core_finding: "无基本面报告".to_string(),
        };
    }

    let risk_reward_ratio = risk_reward_re().captures(report).and_then(|c| c[1].parse::<f64>().ok());
    let target_price = target_price_re().captures(report).and_then(|c| c[1].parse::<f64>().ok());

    let mut rating = Rating::Unclear;
    let mut core_finding = String::new();

    if report.contains("极佳") {
        rating = Rating::StrongBuy;
        core_finding = "盈亏比极佳，悲观情景仍有上涨空间".to_string();
    } else if let Some(ratio) = risk_reward_ratio {
        if ratio > 3.0 {
            rating = Rating::StrongBuy;
            core_finding = format!("盈亏比{ratio:.1}，风险收益优异");
        } else if ratio > 2.0 {
            rating = Rating::Buy;
            core_finding = format!("盈亏比{ratio:.1}，具有投资价值");
        } else if ratio > 1.0 {
            rating = Rating::Hold;
            core_finding = format!("盈亏比{ratio:.1}，风险收益一般");
        } else {
            rating = Rating::Sell;
            core_finding = format!("盈亏比{ratio:.1}，风险大于收益");
        }
    }

    if rating == Rating::Unclear {
        if let Some(tp) = target_price {
            if let Some(caps) = current_price_re().captures(report) {
                if let Ok(current_price) = caps[1].parse::<f64>() {
                    if current_price > 0.0 {
                        let upside = (tp - current_price) / current_price * 100.0;
                        if upside > 30.0 {
                            rating = Rating::Buy;
                            core_finding = format!("目标价{tp}元，上涨空间{upside:.0}%");
                        } else if upside > 10.0 {
                            rating = Rating::Hold;
                            core_finding = format!("目标价{tp}元，上涨空间{upside:.0}%");
                        } else {
                            rating = Rating::Sell;
                            core_finding = "目标价空间有限".to_string();
                        }
                    }
                }
            }
        }
    }

    FundamentalsRating { rating, target_price, risk_reward_ratio, core_finding }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_ratio_yields_strong_buy() {
        let report = "公司基本面稳健，盈亏比：3.5，建议重点关注";
        let result = extract_rating_from_fundamentals_report(report);
        assert_eq!(result.rating, Rating::StrongBuy);
    }

    #[test]
    fn mediocre_ratio_yields_hold() {
        let report = "盈亏比：1.5，维持观望";
        let result = extract_rating_from_fundamentals_report(report);
        assert_eq!(result.rating, Rating::Hold);
    }

    #[test]
    fn falls_back_to_target_price_upside_tiers() {
        let report = "目标价：150元。当前股价：100元。";
        let result = extract_rating_from_fundamentals_report(report);
        assert_eq!(result.rating, Rating::Buy);
    }

    #[test]
    fn empty_report_is_unclear() {
        let result = extract_rating_from_fundamentals_report("");
        assert_eq!(result.rating, Rating::Unclear);
    }
}
