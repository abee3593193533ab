pub mod decision;
pub mod rating;
pub mod reflection;
pub mod valuation;

pub use decision::{extract_decision, ExtractedDecision};
pub use rating::{extract_rating_from_fundamentals_report, FundamentalsRating, Rating};
pub use reflection::{judge_prior_decision, ReflectionReport, ReflectionVerdict};
pub use valuation::{
    extract_target_price, extract_valuation_decision, format_validation_warnings, is_high_dividend_stock,
    score_concept_relevance, validate_valuation_report, ConceptEvidence, DailyBasicStats, ValuationDecision,
    ValuationReport,
};
