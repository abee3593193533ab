use crate::error::{ErrorCategory, ToolError};

/// Per-category suggestion lists for A-share data-source failures, carried
/// over from the original Tushare-specific diagnostic table.
fn suggestions_for(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Auth => &[
            "check that the TUSHARE_TOKEN environment variable is set correctly",
            "confirm the token is valid (verify at tushare.pro)",
            "some endpoints require a higher-tier token",
        ],
        ErrorCategory::RateLimit => &[
            "the data source enforces a rate limit, retry after a short wait",
            "consider caching to reduce call volume",
            "consider upgrading the data-source plan for a higher quota",
        ],
        ErrorCategory::NotFound => &[
            "confirm the ticker format is correct (e.g. 600036)",
            "the stock may have been delisted or had its code changed",
            "there may be no data for the requested date range",
        ],
        ErrorCategory::Network => &[
            "check network connectivity",
            "the data source may be temporarily unavailable",
            "try a different network path",
        ],
        _ => &["check the input parameters", "retry or contact the data-source support"],
    }
}

/// Builds the diagnostic string attached to a failed tool response, naming
/// the context, the underlying error, and category-specific suggestions.
pub fn format_error_message(context: &str, error: Option<&str>, suggestions: &[&str]) -> String {
    let mut lines = vec![format!("[data fetch failed] {context}")];
    if let Some(error) = error {
        lines.push(format!("error: {error}"));
    }
    if !suggestions.is_empty() {
        lines.push("possible causes/suggestions:".to_string());
        for (i, s) in suggestions.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, s));
        }
    }
    lines.join("\n")
}

pub fn diagnostic_message(source: &str, tool_name: &str, error: &ToolError) -> String {
    let category = error.category();
    let suggestions = suggestions_for(category);
    format_error_message(
        &format!("fetching {tool_name} data from {source}"),
        Some(&error.message()),
        suggestions,
    )
}
