use ashare_core::{InvestmentDebateState, RiskDebateState, RiskSpeaker};

/// Who should speak next in the bull/bear investment debate. Alternates
/// starting with the bull side; the debate is over once `count` reaches
/// `2 * max_rounds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentTurn {
    Bull,
    Bear,
    Done,
}

pub fn next_investment_turn(state: &InvestmentDebateState, max_rounds: u32) -> InvestmentTurn {
    if state.count >= 2 * max_rounds {
        return InvestmentTurn::Done;
    }
    if state.count % 2 == 0 {
        InvestmentTurn::Bull
    } else {
        InvestmentTurn::Bear
    }
}

/// Advances the risk committee round-robin (momentum -> value -> risk
/// manager -> momentum -> ...), terminating once `count` reaches
/// `3 * max_rounds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTurn {
    Speak(RiskSpeaker),
    Done,
}

pub fn next_risk_turn(state: &RiskDebateState, max_rounds: u32) -> RiskTurn {
    if state.count >= 3 * max_rounds {
        return RiskTurn::Done;
    }
    let speaker = match state.latest_speaker {
        None => RiskSpeaker::Momentum,
        Some(prev) => prev.next(),
    };
    RiskTurn::Speak(speaker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investment_debate_alternates_and_terminates() {
        let mut state = InvestmentDebateState::default();
        assert_eq!(next_investment_turn(&state, 2), InvestmentTurn::Bull);
        state.count = 1;
        assert_eq!(next_investment_turn(&state, 2), InvestmentTurn::Bear);
        state.count = 4;
        assert_eq!(next_investment_turn(&state, 2), InvestmentTurn::Done);
    }

    #[test]
    fn risk_debate_rotates_three_ways_and_terminates() {
        let mut state = RiskDebateState::default();
        assert_eq!(next_risk_turn(&state, 1), RiskTurn::Speak(RiskSpeaker::Momentum));
        state.latest_speaker = Some(RiskSpeaker::Momentum);
        assert_eq!(next_risk_turn(&state, 1), RiskTurn::Speak(RiskSpeaker::Value));
        state.latest_speaker = Some(RiskSpeaker::Value);
        assert_eq!(next_risk_turn(&state, 1), RiskTurn::Speak(RiskSpeaker::RiskManager));
        state.count = 3;
        assert_eq!(next_risk_turn(&state, 1), RiskTurn::Done);
    }
}
