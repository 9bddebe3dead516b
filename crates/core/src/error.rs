use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::outcome::Outcome;

/// Test-authoring mistakes caught before anything is sent to the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid schema document: {0}")]
    InvalidSchema(String),

    #[error("overlay key `{0}` is reserved and cannot be overridden")]
    ReservedOverlayKey(String),

    #[error("options overlay must be a JSON object, got {0}")]
    InvalidOverlay(String),

    #[error("invalid matrix definition: {0}")]
    InvalidMatrix(String),
}

/// Errors reported by an [`IngestionService`](crate::service::IngestionService).
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service refused the ingestion spec outright.
    #[error("ingestion spec rejected: {0}")]
    Rejected(String),

    /// The task did not reach a terminal state in time.
    #[error("task {task_id} not terminal after {seconds}s")]
    Timeout { task_id: String, seconds: u64 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ServiceError {
    /// Transport trouble or an elapsed wait, as opposed to an answer from
    /// the service.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Http(_) | ServiceError::Timeout { .. })
    }
}

/// Why a single matrix case did not pass.
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("submission failed: {0}")]
    Submission(#[source] ServiceError),

    #[error("outcome mismatch for task {task_id}: expected {expected}, actual {actual}")]
    OutcomeMismatch {
        task_id: String,
        expected: Outcome,
        actual: Outcome,
        message: Option<String>,
    },

    #[error("task {task_id} did not finish within {}s", timeout.as_secs())]
    VerificationTimeout { task_id: String, timeout: Duration },

    #[error("verification failed for {datasource}: {reason}")]
    Verification {
        task_id: String,
        datasource: String,
        reason: String,
    },

    /// The service could not be reached or did not answer usefully. `task_id`
    /// is unset when the task was never accepted.
    #[error("service error while {stage}: {source}")]
    Service {
        stage: &'static str,
        task_id: Option<String>,
        #[source]
        source: ServiceError,
    },
}

/// Per-case verdict shown in matrix reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    /// Infrastructure trouble: re-run rather than treat as a regression.
    Inconclusive,
}

impl CaseError {
    pub fn status(&self) -> CaseStatus {
        match self {
            CaseError::VerificationTimeout { .. } | CaseError::Service { .. } => {
                CaseStatus::Inconclusive
            }
            CaseError::Configuration(_)
            | CaseError::Submission(_)
            | CaseError::OutcomeMismatch { .. }
            | CaseError::Verification { .. } => CaseStatus::Failed,
        }
    }

    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CaseError::Configuration(_) => "configuration",
            CaseError::Submission(_) => "submission",
            CaseError::OutcomeMismatch { .. } => "outcome_mismatch",
            CaseError::VerificationTimeout { .. } => "verification_timeout",
            CaseError::Verification { .. } => "verification",
            CaseError::Service { .. } => "service",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CaseStatus::Passed => "PASS",
            CaseStatus::Failed => "FAIL",
            CaseStatus::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(label)
    }
}
