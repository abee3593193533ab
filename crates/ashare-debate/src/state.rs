use ashare_core::{InvestmentDebateState, RiskDebateState, RiskSpeaker};

use crate::claims::{extract_claims_simple, mark_claims_addressed};
use crate::history::{summarize_history, KEEP_RECENT_CHARS, MAX_HISTORY_CHARS};

/// Claims extracted per turn (§4.4 step 2).
pub const MAX_CLAIMS_PER_TURN: usize = 3;
/// Keyword-coverage ratio above which a pending claim counts as addressed.
pub const CLAIM_ADDRESSED_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentSpeaker {
    Bull,
    Bear,
}

impl InvestmentSpeaker {
    pub fn tag(self) -> &'static str {
        match self {
            InvestmentSpeaker::Bull => "Bull",
            InvestmentSpeaker::Bear => "Bear",
        }
    }

    pub fn opponent_label(self) -> &'static str {
        match self {
            InvestmentSpeaker::Bull => "多方",
            InvestmentSpeaker::Bear => "空方",
        }
    }
}

fn append_and_cap(history: &mut String, entry: &str) {
    history.push_str(entry);
    *history = summarize_history(history, MAX_HISTORY_CHARS, KEEP_RECENT_CHARS);
}

/// Applies one bull/bear turn to the debate state: appends the utterance to
/// `history` and the speaker's own history (capping both at the
/// context-window ceiling), marks any of this speaker's `pending_rebuttals`
/// that the utterance addressed, replaces `pending_rebuttals` with this
/// turn's freshly extracted claims (for the opponent's next turn), and
/// increments `count`.
pub fn apply_investment_turn(state: &mut InvestmentDebateState, speaker: InvestmentSpeaker, response: &str) {
    let entry = format!("{}: {response}\n", speaker.tag());

    append_and_cap(&mut state.history, &entry);
    match speaker {
        InvestmentSpeaker::Bull => append_and_cap(&mut state.bull_history, &entry),
        InvestmentSpeaker::Bear => append_and_cap(&mut state.bear_history, &entry),
    }
    state.current_response = entry;

    let (_, newly_addressed) = mark_claims_addressed(&state.pending_rebuttals, response, CLAIM_ADDRESSED_THRESHOLD);
    state.addressed_claims.extend(newly_addressed);

    let new_claims = extract_claims_simple(response, MAX_CLAIMS_PER_TURN);
    match speaker {
        InvestmentSpeaker::Bull => state.bull_claims.extend(new_claims.clone()),
        InvestmentSpeaker::Bear => state.bear_claims.extend(new_claims.clone()),
    }
    state.pending_rebuttals = new_claims;

    state.count += 1;
}

fn risk_tag(speaker: RiskSpeaker) -> &'static str {
    match speaker {
        RiskSpeaker::Momentum => "Risky",
        RiskSpeaker::Value => "Safe",
        RiskSpeaker::RiskManager => "Neutral",
    }
}

/// Applies one risk-committee turn: appends to `history` and the speaker's
/// own history, records `current_{speaker}_response`, advances
/// `latest_speaker`, and increments `count`. The risk debate carries no
/// claim-tracking fields in the data model, unlike the investment debate.
pub fn apply_risk_turn(state: &mut RiskDebateState, speaker: RiskSpeaker, response: &str) {
    let entry = format!("{}: {response}\n", risk_tag(speaker));

    append_and_cap(&mut state.history, &entry);
    match speaker {
        RiskSpeaker::Momentum => {
            append_and_cap(&mut state.momentum_history, &entry);
            state.current_momentum_response = entry;
        }
        RiskSpeaker::Value => {
            append_and_cap(&mut state.value_history, &entry);
            state.current_value_response = entry;
        }
        RiskSpeaker::RiskManager => {
            append_and_cap(&mut state.risk_manager_history, &entry);
            state.current_risk_manager_response = entry;
        }
    }

    state.latest_speaker = Some(speaker);
    state.count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investment_turn_tracks_claims_and_count() {
        let mut state = InvestmentDebateState::default();
        state.pending_rebuttals = vec!["PE达到了200倍，显著高于行业均值".to_string()];

        apply_investment_turn(
            &mut state,
            InvestmentSpeaker::Bull,
            "关于200倍的担忧，我们认为行业均值本身也在抬升。因此估值并不算离谱。",
        );

        assert_eq!(state.count, 1);
        assert!(state.addressed_claims.iter().any(|c| c.contains("200倍")));
        assert!(!state.pending_rebuttals.is_empty());
        assert!(state.bull_history.contains("Bull:"));
        assert!(state.history.contains("Bull:"));
    }

    #[test]
    fn addressed_claim_leaves_pending_rebuttals_for_opponent() {
        let mut state = InvestmentDebateState::default();
        apply_investment_turn(&mut state, InvestmentSpeaker::Bull, "营收增长了30%非常显著，因此前景向好。");
        assert_eq!(state.pending_rebuttals, state.bull_claims);
    }

    #[test]
    fn risk_turn_rotates_speaker_and_history() {
        let mut state = RiskDebateState::default();
        apply_risk_turn(&mut state, RiskSpeaker::Momentum, "上行空间充足，建议加仓。");
        assert_eq!(state.latest_speaker, Some(RiskSpeaker::Momentum));
        assert!(state.current_momentum_response.contains("加仓"));
        assert_eq!(state.count, 1);

        apply_risk_turn(&mut state, RiskSpeaker::Value, "下行风险不可忽视，建议控制仓位。");
        assert_eq!(state.latest_speaker, Some(RiskSpeaker::Value));
        assert_eq!(state.count, 2);
    }
}
