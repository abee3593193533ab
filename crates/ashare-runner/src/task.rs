use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single analysis task (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Step counters surfaced to a polling UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current_step: String,
    pub completed_steps: u32,
    pub total_steps: u32,
}

/// Result bundle written once a task reaches a terminal status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub signal: Option<String>,
    pub consolidation_report: Option<String>,
    pub error: Option<String>,
}

/// One task's full tracked state. Owned by a single worker for the
/// duration of the run; readers only ever see consistent snapshots since
/// every mutation replaces the value the `DashMap` holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub ticker: String,
    pub trade_date: String,
    pub status: TaskStatus,
    pub logs: Vec<String>,
    pub progress: Progress,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tail-surfaced log cap (§4.8): only the most recent 50 entries are kept.
pub const MAX_LOG_ENTRIES: usize = 50;

impl Task {
    pub fn new(task_id: impl Into<String>, ticker: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ticker: ticker.into(),
            trade_date: trade_date.into(),
            status: TaskStatus::Pending,
            logs: Vec::new(),
            progress: Progress::default(),
            result: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn push_log(&mut self, message: impl Into<String>) {
        let line = format!("[{}] {}", Utc::now().to_rfc3339(), message.into());
        self.logs.push(line);
        if self.logs.len() > MAX_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_log_caps_to_fifty_tail_entries() {
        let mut task = Task::new("t1", "600036", "2024-06-01");
        for i in 0..60 {
            task.push_log(format!("event {i}"));
        }
        assert_eq!(task.logs.len(), MAX_LOG_ENTRIES);
        assert!(task.logs.first().unwrap().contains("event 10"));
        assert!(task.logs.last().unwrap().contains("event 59"));
    }
}
