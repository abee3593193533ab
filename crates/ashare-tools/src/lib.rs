pub mod envelope;
pub mod error;
pub mod registry;
pub mod retry;
pub mod sources;
pub mod suggestions;

pub use envelope::ToolResponse;
pub use error::{ErrorCategory, ToolError};
pub use registry::{Tool, ToolRegistry};
pub use retry::{retry_with_backoff, BackoffPolicy};
pub use sources::{ChinaMarketRegimeTool, FinancialsTool, MarketDataTool, NewsTool, SentimentTool};

/// Builds a registry pre-populated with the standard A-share data-source
/// tools every analyst role draws its subset from.
pub fn default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(std::sync::Arc::new(sources::MarketDataTool));
    registry.register(std::sync::Arc::new(sources::FinancialsTool));
    registry.register(std::sync::Arc::new(sources::NewsTool));
    registry.register(std::sync::Arc::new(sources::SentimentTool));
    registry.register(std::sync::Arc::new(sources::ChinaMarketRegimeTool));
    registry
}

/// Tool-name subset bound to each analyst role (§5 role -> tool-set mapping).
pub fn tool_names_for_role(role_name: &str) -> &'static [&'static str] {
    match role_name {
        "market_analyst" => &["get_market_data"],
        "sentiment_analyst" => &["get_sentiment_data"],
        "news_analyst" => &["get_news"],
        "fundamentals_analyst" => &["get_financials", "get_market_data"],
        "china_market_analyst" => &["get_china_market_regime", "get_market_data"],
        _ => &[],
    }
}
