//! Per-case workflow: validate, merge, submit, wait, compare, verify.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, warn};

use ingest_matrix_core::{
    CaseError, Fixture, IngestionService, IngestionSpec, InputFormat, JobHandle, MatrixConfig,
    OptionsOverlay, Outcome, ServiceError, TestCase,
};

use crate::report::{CaseReport, MatrixReport};

/// What a passing case observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub format: InputFormat,
    pub task_id: String,
    pub datasource: String,
    pub actual: Outcome,
    /// Rows checked against the fixture; `None` when the task was expected
    /// to fail and did.
    pub rows_verified: Option<usize>,
    pub elapsed: Duration,
}

/// Runs matrix cases against one ingestion service.
///
/// Holds no per-case state: cases may run in any order or concurrently, and
/// running the same case twice submits two independent tasks.
pub struct MatrixRunner {
    service: Arc<dyn IngestionService>,
    fixture: Fixture,
    timeout: Duration,
    datasource_suffix: String,
    unload_after: bool,
}

impl MatrixRunner {
    pub fn new(service: Arc<dyn IngestionService>, fixture: Fixture, timeout: Duration) -> Self {
        Self {
            service,
            fixture,
            timeout,
            datasource_suffix: String::new(),
            unload_after: false,
        }
    }

    pub fn from_config(service: Arc<dyn IngestionService>, config: &MatrixConfig) -> Self {
        Self {
            service,
            fixture: config.runner.fixture(),
            timeout: config.runner.timeout(),
            datasource_suffix: config.runner.datasource_suffix.clone(),
            unload_after: config.runner.unload_after,
        }
    }

    pub fn with_datasource_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.datasource_suffix = suffix.into();
        self
    }

    /// Drop each case's datasource once the case is done.
    pub fn with_unload_after(mut self, unload_after: bool) -> Self {
        self.unload_after = unload_after;
        self
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, case: &TestCase) -> Result<CaseOutcome, CaseError> {
        self.run_case(&case.format, case.overlay.as_ref(), case.expected)
            .await
    }

    /// Run one ingestion of `format` and check it against `expected`.
    ///
    /// Format and schema problems are reported before anything reaches the
    /// service. The wait for the task is bounded by the runner timeout; if it
    /// elapses, or the returned future is dropped early, the task is cancelled
    /// in the background.
    pub async fn run_case(
        &self,
        format: &str,
        overlay: Option<&OptionsOverlay>,
        expected: Outcome,
    ) -> Result<CaseOutcome, CaseError> {
        let started = Instant::now();

        let format = InputFormat::parse(format)?;
        let options = format.resolve_options(overlay)?;
        let datasource = self.fixture.datasource_name(&self.datasource_suffix);
        let spec = IngestionSpec::build(format, &options, &self.fixture, datasource);

        let handle = self.service.submit(&spec).await.map_err(|e| {
            error!(format = %format, datasource = %spec.datasource, error = %e, "Submission failed");
            if e.is_transient() {
                CaseError::Service {
                    stage: "submitting task",
                    task_id: None,
                    source: e,
                }
            } else {
                CaseError::Submission(e)
            }
        })?;
        info!(format = %format, task_id = %handle.task_id, datasource = %handle.datasource, "Task submitted");

        let result = self.observe(format, &handle, expected, started).await;

        let timed_out = matches!(result, Err(CaseError::VerificationTimeout { .. }));
        if self.unload_after && !timed_out {
            if let Err(e) = self.service.unload(&handle.datasource).await {
                warn!(datasource = %handle.datasource, error = %e, "Unload failed");
            }
        }

        result
    }

    async fn observe(
        &self,
        format: InputFormat,
        handle: &JobHandle,
        expected: Outcome,
        started: Instant,
    ) -> Result<CaseOutcome, CaseError> {
        let guard = CancelOnDrop::new(Arc::clone(&self.service), handle.clone());

        let waited = tokio::time::timeout(
            self.timeout,
            self.service.await_terminal(handle, self.timeout),
        )
        .await;

        let terminal = match waited {
            Ok(Ok(terminal)) => terminal,
            Ok(Err(ServiceError::Timeout { .. })) | Err(_) => {
                warn!(task_id = %handle.task_id, timeout_seconds = self.timeout.as_secs(), "Task not terminal in time");
                return Err(CaseError::VerificationTimeout {
                    task_id: handle.task_id.clone(),
                    timeout: self.timeout,
                });
            }
            Ok(Err(e)) => {
                error!(task_id = %handle.task_id, error = %e, "Waiting on task failed");
                return Err(CaseError::Service {
                    stage: "awaiting task",
                    task_id: Some(handle.task_id.clone()),
                    source: e,
                });
            }
        };
        guard.disarm();

        let actual = terminal.outcome();
        if actual != expected {
            error!(
                task_id = %handle.task_id,
                expected = %expected,
                actual = %actual,
                "Outcome mismatch"
            );
            return Err(CaseError::OutcomeMismatch {
                task_id: handle.task_id.clone(),
                expected,
                actual,
                message: terminal.message,
            });
        }

        let rows_verified = if terminal.succeeded {
            let result = self
                .service
                .query(&handle.datasource)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        CaseError::Service {
                            stage: "querying datasource",
                            task_id: Some(handle.task_id.clone()),
                            source: e,
                        }
                    } else {
                        CaseError::Verification {
                            task_id: handle.task_id.clone(),
                            datasource: handle.datasource.clone(),
                            reason: format!("query failed: {e}"),
                        }
                    }
                })?;
            Some(self.fixture.verify(handle, &result)?)
        } else {
            None
        };

        info!(
            format = %format,
            task_id = %handle.task_id,
            rows = ?rows_verified,
            "Case passed"
        );

        Ok(CaseOutcome {
            format,
            task_id: handle.task_id.clone(),
            datasource: handle.datasource.clone(),
            actual,
            rows_verified,
            elapsed: started.elapsed(),
        })
    }

    /// Run a case and turn whatever happened into a report.
    pub async fn run_reported(&self, case: &TestCase) -> CaseReport {
        let started_at = Utc::now();
        let result = self.run(case).await;
        CaseReport::from_result(case, result, started_at, Utc::now())
    }

    /// Run every case, at most `concurrency` at a time.
    ///
    /// Each case gets its own tokio task; a failing or panicking case never
    /// stops its siblings. Reports come back in declaration order.
    pub async fn run_matrix(self: &Arc<Self>, cases: Vec<TestCase>, concurrency: usize) -> MatrixReport {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        info!(cases = cases.len(), concurrency, service = self.service.name(), "Running matrix");

        let handles: Vec<_> = cases
            .iter()
            .cloned()
            .map(|case| {
                let runner = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    runner.run_reported(&case).await
                })
            })
            .collect();

        let reports = join_all(handles)
            .await
            .into_iter()
            .zip(&cases)
            .map(|(joined, case)| {
                joined.unwrap_or_else(|e| CaseReport::crashed(case, &e.to_string()))
            })
            .collect();

        let report = MatrixReport::new(reports);
        report.log_summary();
        report
    }
}

/// Cancels the task in the background unless disarmed first.
struct CancelOnDrop {
    service: Arc<dyn IngestionService>,
    handle: Option<JobHandle>,
}

impl CancelOnDrop {
    fn new(service: Arc<dyn IngestionService>, handle: JobHandle) -> Self {
        Self {
            service,
            handle: Some(handle),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(task_id = %handle.task_id, "No runtime to cancel task on");
            return;
        };
        let service = Arc::clone(&self.service);
        runtime.spawn(async move {
            match service.cancel(&handle).await {
                Ok(()) => info!(task_id = %handle.task_id, "Task cancelled"),
                Err(e) => warn!(task_id = %handle.task_id, error = %e, "Cancel failed"),
            }
        });
    }
}
