pub mod claims;
pub mod history;
pub mod protocol;
pub mod state;

pub use claims::{extract_claims_simple, format_rebuttal_section, mark_claims_addressed};
pub use history::{summarize_history, KEEP_RECENT_CHARS, MAX_HISTORY_CHARS};
pub use protocol::{next_investment_turn, next_risk_turn, InvestmentTurn, RiskTurn};
pub use state::{apply_investment_turn, apply_risk_turn, InvestmentSpeaker, CLAIM_ADDRESSED_THRESHOLD, MAX_CLAIMS_PER_TURN};
