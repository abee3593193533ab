use ashare_core::DecisionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReflectionVerdict {
    Correct,
    Degraded,
    Incorrect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionReport {
    pub verdict: ReflectionVerdict,
    pub score: u8,
    pub rationale: String,
}

/// Judges whether a prior decision on this ticker turned out correct, given
/// the realised return since that decision. BUY-family decisions are correct
/// above +5%, SELL-family below -5%, HOLD correct within ±3%; anything else
/// is a degraded call rather than an outright miss.
pub fn judge_prior_decision(prior_decision: DecisionType, subsequent_return_pct: f64) -> ReflectionReport {
    use DecisionType::*;

    let is_buy_family = matches!(prior_decision, StrongBuy | Buy);
    let is_sell_family = matches!(prior_decision, StrongSell | Sell | Reduce);
    let is_hold = matches!(prior_decision, Hold);

    let (verdict, score, rationale) = if is_buy_family && subsequent_return_pct > 5.0 {
        (
            ReflectionVerdict::Correct,
            score_from_magnitude(subsequent_return_pct, 5.0),
            format!("买入判断兑现，后续涨幅{subsequent_return_pct:.1}%"),
        )
    } else if is_sell_family && subsequent_return_pct < -5.0 {
        (
            ReflectionVerdict::Correct,
            score_from_magnitude(-subsequent_return_pct, 5.0),
            format!("卖出/减持判断兑现，后续跌幅{:.1}%", -subsequent_return_pct),
        )
    } else if is_hold && subsequent_return_pct.abs() < 3.0 {
        (
            ReflectionVerdict::Correct,
            score_from_magnitude(3.0 - subsequent_return_pct.abs(), 3.0),
            format!("持有判断兑现，后续波动仅{subsequent_return_pct:.1}%"),
        )
    } else if (is_buy_family && subsequent_return_pct < -5.0) || (is_sell_family && subsequent_return_pct > 5.0) {
        (
            ReflectionVerdict::Incorrect,
            (3u8).saturating_sub((subsequent_return_pct.abs() / 10.0) as u8),
            format!("判断与后续走势({subsequent_return_pct:.1}%)相反"),
        )
    } else {
        (
            ReflectionVerdict::Degraded,
            5,
            format!("判断方向未被证伪但力度不足，后续变动{subsequent_return_pct:.1}%"),
        )
    };

    ReflectionReport { verdict, score: score.clamp(1, 10), rationale }
}

fn score_from_magnitude(excess: f64, baseline: f64) -> u8 {
    let ratio = 1.0 + (excess / baseline).max(0.0);
    (6.0 + ratio).round().clamp(6.0, 10.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_correct_above_5pct() {
        let r = judge_prior_decision(DecisionType::Buy, 12.0);
        assert_eq!(r.verdict, ReflectionVerdict::Correct);
        assert!(r.score >= 6);
    }

    #[test]
    fn sell_correct_below_minus_5pct() {
        let r = judge_prior_decision(DecisionType::Sell, -9.0);
        assert_eq!(r.verdict, ReflectionVerdict::Correct);
    }

    #[test]
    fn hold_correct_within_3pct() {
        let r = judge_prior_decision(DecisionType::Hold, 1.0);
        assert_eq!(r.verdict, ReflectionVerdict::Correct);
    }

    #[test]
    fn buy_incorrect_on_large_drop() {
        let r = judge_prior_decision(DecisionType::Buy, -15.0);
        assert_eq!(r.verdict, ReflectionVerdict::Incorrect);
    }

    #[test]
    fn ambiguous_case_is_degraded() {
        let r = judge_prior_decision(DecisionType::Buy, 2.0);
        assert_eq!(r.verdict, ReflectionVerdict::Degraded);
    }
}
