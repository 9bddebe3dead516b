//! Overlord task status and report payloads.

use serde::Deserialize;
use serde_json::Value;

/// Lifecycle state of an indexing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Waiting,
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskState {
    /// Unknown codes are treated as still in flight.
    pub fn parse(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "SUCCESS" => TaskState::Success,
            "FAILED" => TaskState::Failed,
            "WAITING" => TaskState::Waiting,
            "PENDING" => TaskState::Pending,
            _ => TaskState::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }
}

/// Body of `GET /druid/indexer/v1/task/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusResponse {
    pub task: String,
    #[serde(default)]
    pub status: Option<TaskStatusBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusBody {
    #[serde(default)]
    pub status_code: Option<String>,
    /// Older Overlords only send this one.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

impl TaskStatusResponse {
    pub fn state(&self) -> TaskState {
        self.status
            .as_ref()
            .and_then(|s| s.status_code.as_deref().or(s.status.as_deref()))
            .map(TaskState::parse)
            .unwrap_or(TaskState::Pending)
    }

    pub fn error_msg(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error_msg.as_deref())
    }
}

/// Body of `POST /druid/indexer/v1/task`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task: String,
}

/// Whether a task report shows rejected rows.
///
/// Sums `processedWithError` and `unparseable` over every `rowStats` section
/// of the `ingestionStatsAndErrors` report. Parallel tasks nest the counters
/// per phase, so the whole subtree is walked.
pub fn rows_rejected(report: &Value) -> bool {
    let Some(row_stats) = report.pointer("/ingestionStatsAndErrors/payload/rowStats") else {
        return false;
    };
    rejected_count(row_stats) > 0
}

/// Rows the task read, summed over the `processed` counters, or `None`
/// when the report carries no row stats.
pub fn rows_processed(report: &Value) -> Option<u64> {
    let row_stats = report.pointer("/ingestionStatsAndErrors/payload/rowStats")?;
    Some(sum_counters(row_stats, &["processed"]))
}

fn rejected_count(value: &Value) -> u64 {
    sum_counters(value, &["processedWithError", "unparseable"])
}

fn sum_counters(value: &Value, names: &[&str]) -> u64 {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| match key.as_str() {
                k if names.contains(&k) => v.as_u64().unwrap_or(0),
                _ => sum_counters(v, names),
            })
            .sum(),
        _ => 0,
    }
}
