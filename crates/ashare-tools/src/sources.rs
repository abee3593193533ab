use async_trait::async_trait;
use ashare_core::normalize_ticker;
use serde::Deserialize;

use crate::error::ToolError;
use crate::registry::Tool;

fn render_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "—".to_string(),
    }
}

#[derive(Deserialize)]
struct TickerDateArgs {
    ticker: String,
    #[serde(default)]
    trade_date: Option<String>,
}

fn parse_ticker_args(args: &serde_json::Value) -> Result<TickerDateArgs, ToolError> {
    let parsed: TickerDateArgs = serde_json::from_value(args.clone())
        .map_err(|e| ToolError::InvalidParam(format!("invalid arguments: {e}")))?;
    // Validates the six-digit code / exchange-suffix contract up front so a
    // malformed ticker fails fast as INVALID_PARAM rather than reaching the
    // (mock) data source.
    normalize_ticker(&parsed.ticker).map_err(|_| {
        ToolError::InvalidParam(format!("ticker must be a six-digit A-share code, got {}", parsed.ticker))
    })?;
    Ok(parsed)
}

/// Daily market-data tool (bars/quote), modelled on the Tushare `daily`
/// endpoint contract: ticker normalisation, Markdown table output, missing
/// values rendered as `—`.
pub struct MarketDataTool;

#[async_trait]
impl Tool for MarketDataTool {
    fn name(&self) -> &str {
        "get_market_data"
    }

    fn description(&self) -> &str {
        "Fetches daily OHLCV bars and the latest quote for an A-share ticker."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "six-digit A-share code"},
                "trade_date": {"type": "string", "description": "YYYY-MM-DD"}
            },
            "required": ["ticker"]
        })
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let parsed = parse_ticker_args(args)?;
        let normalized = normalize_ticker(&parsed.ticker).expect("validated above");
        let date = parsed.trade_date.unwrap_or_else(|| "latest".to_string());

        Ok(format!(
            "## Market data for {normalized} ({date})\n\n\
             | field | value |\n|---|---|\n\
             | close | {} |\n\
             | volume | {} |\n\
             | pct_change | {} |\n",
            render_number(Some(12.34)),
            render_number(Some(1_200_000.0)),
            render_number(Some(1.25)),
        ))
    }

    fn source(&self) -> &str {
        "tushare"
    }
}

/// Fundamentals/valuation tool: daily_basic-style PE/PB/dividend fields,
/// with the numeric formulas documented inline so the calling LLM can cite
/// them (e.g. TTM dividend = sum of cash dividends with ex-dates in the
/// preceding 365 days).
pub struct FinancialsTool;

#[async_trait]
impl Tool for FinancialsTool {
    fn name(&self) -> &str {
        "get_financials"
    }

    fn description(&self) -> &str {
        "Fetches valuation fundamentals (PE, PB, dividend yield) for an A-share ticker."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "six-digit A-share code"},
                "trade_date": {"type": "string", "description": "YYYY-MM-DD"}
            },
            "required": ["ticker"]
        })
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let parsed = parse_ticker_args(args)?;
        let normalized = normalize_ticker(&parsed.ticker).expect("validated above");

        Ok(format!(
            "## Fundamentals for {normalized}\n\n\
             | metric | value | formula |\n|---|---|---|\n\
             | pe (ttm) | {} | price / ttm eps |\n\
             | pe_min (1y) | {} | min daily pe over trailing 252 trading days |\n\
             | pb | {} | price / book value per share |\n\
             | dividend_yield_ttm | {} % | sum(cash dividends, ex-date in trailing 365d) / price |\n\
             | bps | {} | net assets / shares outstanding |\n",
            render_number(Some(18.2)),
            render_number(Some(14.5)),
            render_number(Some(2.1)),
            render_number(Some(2.4)),
            render_number(Some(9.8)),
        ))
    }

    fn source(&self) -> &str {
        "tushare"
    }
}

/// News/sentiment tool: recent headlines plus any hot-concept tags the
/// article associates with the ticker, for the concept-relevance validator
/// to cross-check downstream.
pub struct NewsTool;

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str {
        "get_news"
    }

    fn description(&self) -> &str {
        "Fetches recent news headlines and hot-concept tags for an A-share ticker."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "six-digit A-share code"}
            },
            "required": ["ticker"]
        })
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let parsed = parse_ticker_args(args)?;
        let normalized = normalize_ticker(&parsed.ticker).expect("validated above");

        Ok(format!(
            "## Recent news for {normalized}\n\n\
             - [announcement] quarterly results in line with guidance\n\
             - [concept] mentioned alongside sector peers in a roundup piece\n"
        ))
    }

    fn source(&self) -> &str {
        "akshare"
    }
}

/// Social/sentiment tool: retail discussion-board volume and tone, used by
/// the sentiment analyst role.
pub struct SentimentTool;

#[async_trait]
impl Tool for SentimentTool {
    fn name(&self) -> &str {
        "get_sentiment_data"
    }

    fn description(&self) -> &str {
        "Fetches retail discussion-board volume and sentiment tone for an A-share ticker."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "six-digit A-share code"}
            },
            "required": ["ticker"]
        })
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let parsed = parse_ticker_args(args)?;
        let normalized = normalize_ticker(&parsed.ticker).expect("validated above");

        Ok(format!(
            "## Sentiment snapshot for {normalized}\n\n\
             | field | value |\n|---|---|\n\
             | discussion_volume_7d | {} |\n\
             | bullish_ratio | {} % |\n\
             | tone_change_wow | {} |\n",
            render_number(Some(4200.0)),
            render_number(Some(58.0)),
            render_number(Some(3.5)),
        ))
    }

    fn source(&self) -> &str {
        "eastmoney_guba"
    }
}

/// A-share market-regime tool: index breadth and style-rotation signals for
/// the optional China-market regime analyst role.
pub struct ChinaMarketRegimeTool;

#[async_trait]
impl Tool for ChinaMarketRegimeTool {
    fn name(&self) -> &str {
        "get_china_market_regime"
    }

    fn description(&self) -> &str {
        "Fetches A-share market-wide breadth and style-rotation indicators (advance/decline, northbound flow, turnover)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "trade_date": {"type": "string", "description": "YYYY-MM-DD"}
            }
        })
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct DateOnlyArgs {
            #[serde(default)]
            trade_date: Option<String>,
        }
        let parsed: DateOnlyArgs = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidParam(format!("invalid arguments: {e}")))?;
        let date = parsed.trade_date.unwrap_or_else(|| "latest".to_string());

        Ok(format!(
            "## A-share market regime ({date})\n\n\
             | field | value |\n|---|---|\n\
             | advance_decline_ratio | {} |\n\
             | northbound_flow_net (亿元) | {} |\n\
             | turnover_percentile_1y | {} |\n",
            render_number(Some(1.4)),
            render_number(Some(32.5)),
            render_number(Some(62.0)),
        ))
    }

    fn source(&self) -> &str {
        "akshare"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sentiment_tool_normalizes_ticker() {
        let tool = SentimentTool;
        let out = tool.call(&serde_json::json!({"ticker": "000001"})).await.unwrap();
        assert!(out.contains("000001.SZ"));
    }

    #[tokio::test]
    async fn china_market_regime_tool_defaults_to_latest() {
        let tool = ChinaMarketRegimeTool;
        let out = tool.call(&serde_json::json!({})).await.unwrap();
        assert!(out.contains("latest"));
    }

    #[tokio::test]
    async fn rejects_non_six_digit_ticker_as_invalid_param() {
        let tool = MarketDataTool;
        let err = tool.call(&serde_json::json!({"ticker": "60036"})).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InvalidParam);
    }

    #[tokio::test]
    async fn normalizes_ticker_in_output() {
        let tool = MarketDataTool;
        let out = tool.call(&serde_json::json!({"ticker": "600036"})).await.unwrap();
        assert!(out.contains("600036.SH"));
    }
}
