//! ashare-cli: thin binary wiring the analysis engine's core crates
//! together for a single ticker/date run.
//!
//! Usage:
//!   cargo run -p ashare-cli -- --ticker 600036 --date 2024-06-01
//!
//! This is glue, not a front-end (§1 Out of scope): no auth, no web/terminal
//! UI beyond plain stdout, no progress rendering beyond log lines. Real LLM
//! and data-source credentials are read from the environment the same way
//! `RunConfig::from_env` does; without them the run falls back to the
//! deterministic mock provider so the graph can still be exercised end to
//! end.

use std::sync::Arc;
use std::time::Duration;

use ashare_core::{Message, RunConfig};
use ashare_llm::{HttpLlmConfig, HttpLlmProvider, LlmProvider, MockLlmProvider};
use ashare_memory::{DecisionMemoryStore, HashEmbeddingProvider};
use ashare_orchestrator::GraphConfig;
use ashare_runner::{RunController, TaskStatus};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  ashare-cli --ticker 600036 --date 2024-06-01");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --ticker CODE     six-digit A-share code (required)");
    eprintln!("  --date YYYY-MM-DD analysis trade date (required)");
    eprintln!("  --mock            force the deterministic mock LLM provider");
    std::process::exit(1);
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

/// A deterministic scripted reply sequence long enough to carry a full
/// single-round run (4 analysts + 2 debate turns + manager + trader + 3
/// risk turns + risk judge + consolidation = 13 calls), for `--mock` runs
/// and for any environment with no LLM credentials configured.
fn mock_script() -> Vec<Message> {
    (0..32)
        .map(|i| Message::assistant(format!("（模拟输出 {i}）\n\n暂无可用数据，请谨慎参考。"), vec![]))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ashare_cli=info,ashare_runner=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let ticker = arg_value(&args, "--ticker").unwrap_or_else(|| usage());
    let trade_date = arg_value(&args, "--date").unwrap_or_else(|| usage());
    let force_mock = args.iter().any(|a| a == "--mock");

    let config = RunConfig::from_env();
    config.validate().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    ashare_core::normalize_ticker(&ticker).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!(ticker = %ticker, date = %trade_date, provider = %config.llm_provider, "starting analysis run");

    let llm: Arc<dyn LlmProvider> = if force_mock || config.tushare_token.is_empty() {
        tracing::warn!("no live credentials configured, using deterministic mock LLM provider");
        Arc::new(MockLlmProvider::new(mock_script()))
    } else {
        Arc::new(HttpLlmProvider::new(HttpLlmConfig {
            backend_url: config.backend_url.clone(),
            api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            quick_model: config.quick_think_llm.clone(),
            deep_model: config.deep_think_llm.clone(),
            timeout: config.llm_timeout,
        }))
    };

    let registry = Arc::new(ashare_tools::default_registry());

    sqlx::any::install_default_drivers();
    let pool = match sqlx::any::AnyPoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", config.memory_db_path))
        .await
    {
        Ok(pool) => pool,
        Err(err) => {
            tracing::warn!(%err, "failed to open memory db, falling back to in-memory sqlite");
            sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await?
        }
    };
    let memory = DecisionMemoryStore::new(pool, Some(Arc::new(HashEmbeddingProvider::new(32))));
    memory.init_schema().await.ok();
    let memory = Arc::new(memory);

    let controller = RunController::new(llm, registry, memory, config.results_dir.clone());
    let graph_config = GraphConfig { max_debate_rounds: config.max_debate_rounds, max_risk_discuss_rounds: config.max_risk_discuss_rounds, max_recur_limit: config.max_recur_limit, enable_china_market_analyst: true };

    let task_id = controller.submit(&ticker, &trade_date, graph_config);
    tracing::info!(task_id = %task_id, "task submitted");

    loop {
        let Some(task) = controller.get_task(&task_id) else {
            anyhow::bail!("task {task_id} vanished from the controller");
        };
        match task.status {
            TaskStatus::Completed => {
                let signal = task.result.as_ref().and_then(|r| r.signal.clone()).unwrap_or_default();
                println!("analysis_complete ticker={ticker} date={trade_date} signal={signal}");
                println!("reports written under {}/{ticker}/{trade_date}/reports/", config.results_dir);
                return Ok(());
            }
            TaskStatus::Failed => {
                let message = task.result.as_ref().and_then(|r| r.error.clone()).unwrap_or_else(|| "unknown error".to_string());
                anyhow::bail!("analysis failed: {message}");
            }
            TaskStatus::Pending | TaskStatus::Running => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}
