use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Per-run artifact directory layout (§6): `{results_dir}/{ticker}/{date}/`.
pub fn run_dir(results_dir: &str, ticker: &str, trade_date: &str) -> PathBuf {
    Path::new(results_dir).join(ticker).join(trade_date)
}

pub fn reports_dir(results_dir: &str, ticker: &str, trade_date: &str) -> PathBuf {
    run_dir(results_dir, ticker, trade_date).join("reports")
}

/// Writes a newly populated report field to `reports/{field}.md`, creating
/// parent directories as needed. Synchronous: called from the snapshot
/// callback, which fires between awaits rather than inside one, and a
/// single Markdown write is cheap enough not to warrant its own task.
pub fn write_report_field(results_dir: &str, ticker: &str, trade_date: &str, field: &str, content: &str) -> std::io::Result<()> {
    let dir = reports_dir(results_dir, ticker, trade_date);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(format!("{field}.md")), content)
}

pub fn append_message_log(results_dir: &str, ticker: &str, trade_date: &str, line: &str) -> std::io::Result<()> {
    let dir = run_dir(results_dir, ticker, trade_date);
    fs::create_dir_all(&dir)?;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(dir.join("message_tool.log"))?;
    writeln!(file, "[{}] {line}", Utc::now().to_rfc3339())
}

/// One row of the tool-data CSV (§6 column contract).
#[derive(Debug, Clone)]
pub struct ToolDataRow {
    pub tool_name: String,
    pub data_category: String,
    pub date: String,
    pub metric: String,
    pub value: String,
    pub unit: String,
    pub stock_code: String,
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Appends rows to `tool_data.csv`, writing the header once when the file
/// does not already exist.
pub fn append_tool_data_csv(results_dir: &str, ticker: &str, trade_date: &str, rows: &[ToolDataRow]) -> std::io::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let dir = run_dir(results_dir, ticker, trade_date);
    fs::create_dir_all(&dir)?;
    let path = dir.join("tool_data.csv");
    let is_new = !path.exists();

    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    if is_new {
        writeln!(file, "timestamp,tool_name,data_category,date,metric,value,unit,stock_code")?;
    }
    let now = Utc::now().to_rfc3339();
    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            csv_escape(&now),
            csv_escape(&row.tool_name),
            csv_escape(&row.data_category),
            csv_escape(&row.date),
            csv_escape(&row.metric),
            csv_escape(&row.value),
            csv_escape(&row.unit),
            csv_escape(&row.stock_code),
        )?;
    }
    Ok(())
}

/// Extracts `| metric | value |` Markdown-table rows out of a tool report,
/// skipping the header and separator rows, for best-effort tool-data
/// logging without needing a dispatch-time hook into the tool registry.
pub fn extract_markdown_metrics(markdown: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in markdown.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = trimmed.trim_matches('|').split('|').map(str::trim).collect();
        if cells.len() != 2 {
            continue;
        }
        if cells[0].eq_ignore_ascii_case("field") || cells[0].eq_ignore_ascii_case("metric") {
            continue;
        }
        if cells[0].chars().all(|c| c == '-' || c == ':') {
            continue;
        }
        out.push((cells[0].to_string(), cells[1].to_string()));
    }
    out
}

/// `analysis_summary.json` schema (§6).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub ticker: String,
    pub ticker_name: String,
    pub date: String,
    pub signal: String,
    pub decision: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

pub fn write_analysis_summary(results_dir: &str, ticker: &str, trade_date: &str, summary: &AnalysisSummary) -> std::io::Result<()> {
    let dir = run_dir(results_dir, ticker, trade_date);
    fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(summary).unwrap_or_default();
    fs::write(dir.join("analysis_summary.json"), json)
}

pub fn log_best_effort(label: &str, result: std::io::Result<()>) {
    if let Err(err) = result {
        warn!(label, %err, "artifact write failed, continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_metric_rows_and_skips_header_and_separator() {
        let markdown = "## x\n\n| field | value |\n|---|---|\n| close | 12.34 |\n| volume | 1200000 |\n";
        let rows = extract_markdown_metrics(markdown);
        assert_eq!(rows, vec![("close".to_string(), "12.34".to_string()), ("volume".to_string(), "1200000".to_string())]);
    }

    #[test]
    fn write_report_field_creates_nested_dirs() {
        let dir = std::env::temp_dir().join(format!("ashare-runner-test-{}", uuid_like()));
        let results_dir = dir.to_string_lossy().to_string();
        write_report_field(&results_dir, "600036", "2024-06-01", "market_report", "# hello").unwrap();
        let path = reports_dir(&results_dir, "600036", "2024-06-01").join("market_report.md");
        assert!(path.exists());
        fs::remove_dir_all(&dir).ok();
    }

    fn uuid_like() -> String {
        format!("{:x}", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos())
    }
}
