//! The seam between the matrix runner and the indexing service.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::ingestion_spec::IngestionSpec;
use crate::outcome::TerminalState;
use crate::result::QueryResult;

/// Identifies a submitted ingestion task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub task_id: String,
    pub datasource: String,
}

impl JobHandle {
    pub fn new(task_id: impl Into<String>, datasource: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            datasource: datasource.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.task_id, self.datasource)
    }
}

/// An ingestion/query service the matrix can drive.
///
/// Implementations may be shared by many concurrent cases and must not assume
/// exclusive access to the service behind them.
#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Submit an ingestion task. A refused spec is [`ServiceError::Rejected`].
    async fn submit(&self, spec: &IngestionSpec) -> Result<JobHandle, ServiceError>;

    /// Wait until the task is terminal, at most `timeout`.
    ///
    /// Returns [`ServiceError::Timeout`] when the task is still running.
    async fn await_terminal(
        &self,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<TerminalState, ServiceError>;

    /// Read back the ingested rows of a datasource.
    async fn query(&self, datasource: &str) -> Result<QueryResult, ServiceError>;

    /// Ask the service to stop a task. Best effort.
    async fn cancel(&self, handle: &JobHandle) -> Result<(), ServiceError>;

    /// Drop a datasource created by a case.
    async fn unload(&self, _datasource: &str) -> Result<(), ServiceError> {
        Ok(()) // Default: nothing to clean up
    }

    /// Short label for logs and reports.
    fn name(&self) -> &str;
}
