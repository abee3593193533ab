use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ashare_core::RunState;
use ashare_llm::LlmProvider;
use ashare_memory::DecisionMemoryStore;
use ashare_orchestrator::{create_initial_state, process_signal, stream_analysis, GraphConfig, GraphDeps, OrchestratorError};
use ashare_tools::ToolRegistry;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{error, info};

use crate::artifacts::{
    append_message_log, append_tool_data_csv, extract_markdown_metrics, log_best_effort, write_analysis_summary,
    write_report_field, AnalysisSummary, ToolDataRow,
};
use crate::task::{Progress, Task, TaskResult, TaskStatus};

/// Named `RunState` fields the controller watches for between snapshots,
/// paired with their `reports/{field}.md` filename and the tool-data
/// category the field's source table should be logged under.
const WATCHED_FIELDS: &[(&str, &str)] = &[
    ("market_report", "market"),
    ("sentiment_report", "sentiment"),
    ("news_report", "news"),
    ("fundamentals_report", "fundamentals"),
    ("china_market_report", "china_market_regime"),
];

fn field_value<'a>(state: &'a RunState, field: &str) -> Option<&'a str> {
    match field {
        "market_report" => state.market_report.as_deref(),
        "sentiment_report" => state.sentiment_report.as_deref(),
        "news_report" => state.news_report.as_deref(),
        "fundamentals_report" => state.fundamentals_report.as_deref(),
        "china_market_report" => state.china_market_report.as_deref(),
        _ => None,
    }
}

/// Total node count the graph will visit for a given config, used to size
/// `progress.total_steps` (§4.8). Mirrors the call-count arithmetic the
/// graph test module documents: 4 analysts (+1 optional) + 2x debate
/// rounds + manager + trader + 3x risk rounds + risk judge + consolidation.
fn total_steps(config: &GraphConfig) -> u32 {
    let analysts = if config.enable_china_market_analyst { 5 } else { 4 };
    analysts + 2 * config.max_debate_rounds + 1 + 1 + 3 * config.max_risk_discuss_rounds + 1 + 1
}

/// Owns the task-keyed map and drives analysis runs in the background
/// (§4.8). Cheaply cloneable — every field is an `Arc`-backed handle, the
/// way `ToolRegistry` shares its `DashMap` across callers.
#[derive(Clone)]
pub struct RunController {
    tasks: Arc<DashMap<String, Task>>,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
    llm: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    memory: Arc<DecisionMemoryStore>,
    results_dir: String,
}

impl RunController {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: Arc<ToolRegistry>, memory: Arc<DecisionMemoryStore>, results_dir: impl Into<String>) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            cancel_flags: Arc::new(DashMap::new()),
            llm,
            registry,
            memory,
            results_dir: results_dir.into(),
        }
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// Sets the cancellation flag for a still-running task; a no-op if the
    /// task has already reached a terminal status or does not exist.
    pub fn cancel_task(&self, task_id: &str) {
        if let Some(flag) = self.cancel_flags.get(task_id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Submits a new analysis task and spawns its worker. Returns the
    /// generated task id immediately; the run proceeds in the background.
    pub fn submit(&self, ticker: &str, trade_date: &str, config: GraphConfig) -> String {
        let task_id = format!("{ticker}_{trade_date}_{}", Utc::now().format("%Y%m%d%H%M%S%6f"));
        let mut task = Task::new(&task_id, ticker, trade_date);
        task.progress.total_steps = total_steps(&config);
        task.push_log("task created");
        self.tasks.insert(task_id.clone(), task);

        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(task_id.clone(), cancel_flag.clone());

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_worker(task_id, ticker_owned(ticker), date_owned(trade_date), config, cancel_flag).await;
        });

        task_id
    }

    async fn run_worker(&self, task_id: String, ticker: String, trade_date: String, config: GraphConfig, cancel_flag: Arc<AtomicBool>) {
        self.update_task(&task_id, |t| {
            t.status = TaskStatus::Running;
            t.push_log("worker started");
        });

        let state = create_initial_state(&ticker, &trade_date);
        let deps = GraphDeps { llm: &*self.llm, registry: &*self.registry, memory: &*self.memory, cancel: cancel_flag };

        let controller = self.clone();
        let task_id_for_cb = task_id.clone();
        let result = stream_analysis(state, &deps, &config, move |snapshot| {
            controller.on_snapshot(&task_id_for_cb, snapshot);
        })
        .await;

        match result {
            Ok(snapshots) => {
                let last = snapshots.last().cloned().unwrap_or_else(|| create_initial_state(&ticker, &trade_date));
                self.finish_success(&task_id, &last).await;
            }
            Err(err) => self.finish_failure(&task_id, &err),
        }
    }

    /// Fired synchronously for every streamed snapshot: updates progress,
    /// persists any newly populated report field, and logs a best-effort
    /// tool-data row per field from the Markdown tables it embeds.
    fn on_snapshot(&self, task_id: &str, snapshot: &RunState) {
        for (field, category) in WATCHED_FIELDS {
            let Some(content) = field_value(snapshot, field) else { continue };
            let already_written = self
                .tasks
                .get(task_id)
                .map(|t| t.logs.iter().any(|l| l.contains(&format!("wrote {field}"))))
                .unwrap_or(false);
            if already_written {
                continue;
            }

            log_best_effort("write_report_field", write_report_field(&self.results_dir, &snapshot.ticker, &snapshot.trade_date, field, content));
            log_best_effort(
                "append_message_log",
                append_message_log(&self.results_dir, &snapshot.ticker, &snapshot.trade_date, &format!("{field} populated")),
            );

            let rows: Vec<ToolDataRow> = extract_markdown_metrics(content)
                .into_iter()
                .map(|(metric, value)| ToolDataRow {
                    tool_name: format!("get_{category}_data"),
                    data_category: category.to_string(),
                    date: snapshot.trade_date.clone(),
                    metric,
                    value,
                    unit: String::new(),
                    stock_code: snapshot.ticker.clone(),
                })
                .collect();
            log_best_effort("append_tool_data_csv", append_tool_data_csv(&self.results_dir, &snapshot.ticker, &snapshot.trade_date, &rows));

            self.update_task(task_id, |t| {
                t.push_log(format!("wrote {field}"));
                t.progress.completed_steps += 1;
                t.progress.current_step = field.to_string();
            });
        }

        for (field, content) in [
            ("research_report", Some(snapshot.investment_debate_state.judge_decision.as_str()).filter(|s| !s.is_empty())),
            ("trader_investment_plan", snapshot.trader_investment_plan.as_deref()),
            ("risk_report", Some(snapshot.risk_debate_state.judge_decision.as_str()).filter(|s| !s.is_empty())),
            ("final_trade_decision", snapshot.final_trade_decision.as_deref()),
            ("consolidation_report", snapshot.consolidation_report.as_deref()),
            ("reflection_report", Some(snapshot.previous_decision_reflection.as_str()).filter(|s| !s.is_empty())),
        ] {
            let Some(content) = content else { continue };
            let already_written = self
                .tasks
                .get(task_id)
                .map(|t| t.logs.iter().any(|l| l.contains(&format!("wrote {field}"))))
                .unwrap_or(false);
            if already_written {
                continue;
            }
            log_best_effort("write_report_field", write_report_field(&self.results_dir, &snapshot.ticker, &snapshot.trade_date, field, content));
            self.update_task(task_id, |t| {
                t.push_log(format!("wrote {field}"));
                t.progress.completed_steps += 1;
                t.progress.current_step = field.to_string();
            });
        }
    }

    async fn finish_success(&self, task_id: &str, last: &RunState) {
        let signal = last.final_trade_decision.as_deref().map(process_signal).unwrap_or_else(|| "hold".to_string());
        let decision = last.consolidation_report.clone().or_else(|| last.final_trade_decision.clone()).unwrap_or_default();

        let created_at = self.tasks.get(task_id).map(|t| t.created_at).unwrap_or_else(Utc::now);
        let completed_at = Utc::now();
        let summary = AnalysisSummary {
            ticker: last.ticker.clone(),
            ticker_name: last.ticker.clone(),
            date: last.trade_date.clone(),
            signal: signal.clone(),
            decision,
            user_id: None,
            created_at,
            completed_at,
        };
        log_best_effort("write_analysis_summary", write_analysis_summary(&self.results_dir, &last.ticker, &last.trade_date, &summary));

        self.update_task(task_id, |t| {
            t.status = TaskStatus::Completed;
            t.completed_at = Some(completed_at);
            t.result = Some(TaskResult { signal: Some(signal), consolidation_report: last.consolidation_report.clone(), error: None });
            t.push_log("analysis_complete");
        });
        info!(task_id, "analysis task completed");
    }

    fn finish_failure(&self, task_id: &str, err: &OrchestratorError) {
        let message = match err {
            OrchestratorError::Cancelled => "user-cancelled".to_string(),
            OrchestratorError::GraphRecursionLimit(limit) => format!("recursion limit of {limit} exceeded"),
            other => other.to_string(),
        };
        self.update_task(task_id, |t| {
            t.status = TaskStatus::Failed;
            t.completed_at = Some(Utc::now());
            t.result = Some(TaskResult { signal: None, consolidation_report: None, error: Some(message.clone()) });
            t.push_log(format!("error: {message}"));
        });
        error!(task_id, %message, "analysis task failed");
    }

    fn update_task(&self, task_id: &str, f: impl FnOnce(&mut Task)) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            f(&mut entry);
        }
    }
}

fn ticker_owned(ticker: &str) -> String {
    ticker.to_string()
}

fn date_owned(date: &str) -> String {
    date.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_core::Message;
    use ashare_llm::MockLlmProvider;
    use std::time::Duration;

    async fn memory_store() -> DecisionMemoryStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        DecisionMemoryStore::new(pool, None)
    }

    fn scripted(n: usize) -> Arc<dyn LlmProvider> {
        let messages = (0..n).map(|i| Message::assistant(format!("报告{i}\n\n| field | value |\n|---|---|\n| x | {i} |"), vec![])).collect();
        Arc::new(MockLlmProvider::new(messages))
    }

    async fn wait_for_terminal(controller: &RunController, task_id: &str) -> Task {
        for _ in 0..200 {
            if let Some(task) = controller.get_task(task_id) {
                if matches!(task.status, TaskStatus::Completed | TaskStatus::Failed) {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task did not reach a terminal status in time");
    }

    #[tokio::test]
    async fn submit_runs_to_completion_and_writes_artifacts() {
        let dir = std::env::temp_dir().join(format!("ashare-runner-ctrl-{}", std::process::id()));
        let results_dir = dir.to_string_lossy().to_string();
        let memory = memory_store().await;
        let controller = RunController::new(scripted(13), Arc::new(ashare_tools::default_registry()), Arc::new(memory), results_dir.clone());

        let task_id = controller.submit("600036", "2024-06-01", GraphConfig::default());
        let task = wait_for_terminal(&controller, &task_id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.unwrap().signal.is_some());
        assert!(crate::artifacts::reports_dir(&results_dir, "600036", "2024-06-01").join("market_report.md").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn cancel_task_surfaces_user_cancelled_with_partial_artifacts() {
        let dir = std::env::temp_dir().join(format!("ashare-runner-cancel-{}", std::process::id()));
        let results_dir = dir.to_string_lossy().to_string();
        let memory = memory_store().await;
        // Script carries more replies than needed so the run would
        // otherwise proceed; cancellation must cut it short regardless.
        let controller = RunController::new(scripted(13), Arc::new(ashare_tools::default_registry()), Arc::new(memory), results_dir.clone());

        let task_id = controller.submit("600036", "2024-06-01", GraphConfig::default());
        // Give the market analyst node a chance to complete before cancelling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.cancel_task(&task_id);

        let task = wait_for_terminal(&controller, &task_id).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.result.unwrap().error.as_deref(), Some("user-cancelled"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
