pub mod artifacts;
pub mod controller;
pub mod task;

pub use artifacts::{
    append_message_log, append_tool_data_csv, extract_markdown_metrics, log_best_effort, reports_dir, run_dir,
    write_analysis_summary, write_report_field, AnalysisSummary, ToolDataRow,
};
pub use controller::RunController;
pub use task::{Progress, Task, TaskResult, TaskStatus, MAX_LOG_ENTRIES};
