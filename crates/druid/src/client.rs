//! HTTP client for the Druid indexing and query APIs.
//!
//! [`DruidClient`] submits `index_parallel` tasks to the Overlord, polls their
//! status with exponential backoff until they are terminal, waits for the
//! resulting segments to be loaded, and reads the data back through Broker SQL.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ingest_matrix_core::{
    DruidConfig, IngestionService, IngestionSpec, JobHandle, QueryResult, ServiceError,
    TerminalState,
};

use crate::sql::{parse_sql_rows, SqlRequest};
use crate::task::{rows_processed, rows_rejected, SubmitResponse, TaskState, TaskStatusResponse};

const BACKOFF_FACTOR: f64 = 1.5;

/// Client for one Druid cluster.
pub struct DruidClient {
    config: DruidConfig,
    http: Client,
}

impl DruidClient {
    pub fn new(config: DruidConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        info!(
            overlord = %config.overlord_url,
            broker = %config.broker_url,
            coordinator = %config.coordinator_url,
            "DruidClient initialised"
        );

        Self { config, http }
    }

    pub fn config(&self) -> &DruidConfig {
        &self.config
    }

    /// Overlord task endpoint, `tail` appended as path segments.
    fn task_url(&self, tail: &[&str]) -> Result<Url, ServiceError> {
        let mut segments = vec!["druid", "indexer", "v1", "task"];
        segments.extend_from_slice(tail);
        endpoint(&self.config.overlord_url, &segments)
    }

    /// Coordinator endpoint for one datasource, `tail` appended.
    fn datasource_url(&self, datasource: &str, tail: &[&str]) -> Result<Url, ServiceError> {
        let mut segments = vec!["druid", "coordinator", "v1", "datasources", datasource];
        segments.extend_from_slice(tail);
        endpoint(&self.config.coordinator_url, &segments)
    }

    /// Current status of a task.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ServiceError> {
        let resp = self
            .http
            .get(self.task_url(&[task_id, "status"])?)
            .send()
            .await
            .map_err(http_err)?;
        let resp = ensure_success(resp).await?;
        resp.json().await.map_err(|e| ServiceError::Parse(e.to_string()))
    }

    /// The task's report document (`ingestionStatsAndErrors` and friends).
    pub async fn task_report(&self, task_id: &str) -> Result<Value, ServiceError> {
        let resp = self
            .http
            .get(self.task_url(&[task_id, "reports"])?)
            .send()
            .await
            .map_err(http_err)?;
        let resp = ensure_success(resp).await?;
        resp.json().await.map_err(|e| ServiceError::Parse(e.to_string()))
    }

    /// Percentage of the datasource's segments the cluster has loaded.
    ///
    /// `None` while the coordinator does not know the datasource yet.
    pub async fn load_status(&self, datasource: &str) -> Result<Option<f64>, ServiceError> {
        let resp = self
            .http
            .get(self.datasource_url(datasource, &["loadstatus"])?)
            .query(&[("forceMetadataRefresh", "true")])
            .send()
            .await
            .map_err(http_err)?;

        if resp.status() == StatusCode::NO_CONTENT || resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(body.get(datasource).and_then(Value::as_f64))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Poll the task status with exponential backoff until it is terminal or
    /// `deadline` passes.
    async fn poll_until_terminal(
        &self,
        task_id: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<TaskStatusResponse, ServiceError> {
        let start = Instant::now();
        let mut backoff = Backoff::new(self.config.poll_initial_ms, self.config.poll_max_ms);

        loop {
            let status = self.task_status(task_id).await?;
            let state = status.state();

            debug!(
                task_id = %task_id,
                state = ?state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling task status"
            );

            if state.is_terminal() {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                warn!(task_id = %task_id, timeout_seconds = timeout.as_secs(), "Task timed out");
                return Err(ServiceError::Timeout {
                    task_id: task_id.to_string(),
                    seconds: timeout.as_secs(),
                });
            }

            backoff.sleep_until(deadline).await;
        }
    }

    /// Wait until every segment of `datasource` is loaded, bounded by `deadline`.
    async fn wait_for_segments(
        &self,
        handle: &JobHandle,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(), ServiceError> {
        let mut backoff = Backoff::new(self.config.poll_initial_ms, self.config.poll_max_ms);

        loop {
            let loaded = self.load_status(&handle.datasource).await?;
            debug!(datasource = %handle.datasource, loaded = ?loaded, "Polling segment load status");

            if loaded.is_some_and(|pct| pct >= 100.0) {
                info!(datasource = %handle.datasource, "All segments loaded");
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!(datasource = %handle.datasource, "Segments not loaded before timeout");
                return Err(ServiceError::Timeout {
                    task_id: handle.task_id.clone(),
                    seconds: timeout.as_secs(),
                });
            }

            backoff.sleep_until(deadline).await;
        }
    }
}

#[async_trait]
impl IngestionService for DruidClient {
    async fn submit(&self, spec: &IngestionSpec) -> Result<JobHandle, ServiceError> {
        info!(datasource = %spec.datasource, format = %spec.format, "Submitting ingestion task");

        let resp = self
            .http
            .post(self.task_url(&[])?)
            .json(&spec.payload)
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            error!(datasource = %spec.datasource, %status, "Ingestion spec rejected");
            return Err(ServiceError::Rejected(format!("{status}: {body}")));
        }

        let submitted: SubmitResponse = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        info!(task_id = %submitted.task, datasource = %spec.datasource, "Ingestion task submitted");
        Ok(JobHandle::new(submitted.task, spec.datasource.clone()))
    }

    async fn await_terminal(
        &self,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<TerminalState, ServiceError> {
        let deadline = Instant::now() + timeout;
        let status = self.poll_until_terminal(&handle.task_id, deadline, timeout).await?;

        // Reports are missing on some deployments; treat that as nothing rejected.
        let report = match self.task_report(&handle.task_id).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(task_id = %handle.task_id, error = %e, "Task report unavailable");
                None
            }
        };
        let rejected = report.as_ref().is_some_and(rows_rejected);

        match status.state() {
            TaskState::Success => {
                let processed = report.as_ref().and_then(rows_processed);
                if processed != Some(0) {
                    self.wait_for_segments(handle, deadline, timeout).await?;
                }
                info!(task_id = %handle.task_id, rows_rejected = rejected, "Task succeeded");
                Ok(TerminalState {
                    succeeded: true,
                    partial_failure_flags: (rejected, false),
                    message: None,
                })
            }
            _ => {
                let message = status.error_msg().unwrap_or("unknown").to_string();
                error!(task_id = %handle.task_id, reason = %message, "Task failed");
                Ok(TerminalState {
                    succeeded: false,
                    partial_failure_flags: (rejected, true),
                    message: Some(message),
                })
            }
        }
    }

    async fn query(&self, datasource: &str) -> Result<QueryResult, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/druid/v2/sql", self.config.broker_url))
            .json(&SqlRequest::select_all(datasource))
            .send()
            .await
            .map_err(http_err)?;

        let body: Value = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let result = parse_sql_rows(body)?;
        debug!(datasource = %datasource, rows = result.row_count(), "Queried datasource");
        Ok(result)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), ServiceError> {
        info!(task_id = %handle.task_id, "Cancelling task");
        let resp = self
            .http
            .post(self.task_url(&[handle.task_id.as_str(), "shutdown"])?)
            .send()
            .await
            .map_err(http_err)?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn unload(&self, datasource: &str) -> Result<(), ServiceError> {
        info!(datasource = %datasource, "Unloading datasource");
        let resp = self
            .http
            .delete(self.datasource_url(datasource, &[])?)
            .send()
            .await
            .map_err(http_err)?;
        ensure_success(resp).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "druid"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn http_err(e: reqwest::Error) -> ServiceError {
    ServiceError::Http(e.to_string())
}

/// `base` with `segments` appended, each percent-encoded as a single path
/// segment, so names containing `?`, `/` or `\` stay intact.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base)
        .map_err(|e| ServiceError::Http(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::Http(format!("base URL {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn ensure_success(resp: Response) -> Result<Response, ServiceError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Api(format!("{status}: {body}")))
}

/// Exponential backoff with a little jitter.
struct Backoff {
    delay_ms: u64,
    max_ms: u64,
}

impl Backoff {
    fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            delay_ms: initial_ms.max(1),
            max_ms: max_ms.max(initial_ms),
        }
    }

    fn next_delay(&mut self) -> Duration {
        // Jitter without rand: nanosecond fraction of the current time.
        let jitter_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            % 100;

        let delay = Duration::from_millis(self.delay_ms + jitter_ms as u64);
        self.delay_ms = ((self.delay_ms as f64 * BACKOFF_FACTOR) as u64).min(self.max_ms);
        delay
    }

    /// Sleep for the next delay, never past `deadline`.
    async fn sleep_until(&mut self, deadline: Instant) {
        let wake = (Instant::now() + self.next_delay()).min(deadline);
        tokio::time::sleep_until(wake).await;
    }
}
