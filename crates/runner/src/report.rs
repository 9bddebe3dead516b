use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use ingest_matrix_core::{CaseError, CaseStatus, TestCase};

use crate::runner::CaseOutcome;

/// Result of one matrix case, ready to print or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub format: String,
    pub status: CaseStatus,
    /// Failure kind, e.g. `outcome_mismatch` or `verification_timeout`.
    pub error_kind: Option<&'static str>,
    pub detail: Option<String>,
    pub task_id: Option<String>,
    pub datasource: Option<String>,
    pub rows_verified: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CaseReport {
    pub fn from_result(
        case: &TestCase,
        result: Result<CaseOutcome, CaseError>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let base = Self {
            name: case.name.clone(),
            format: case.format.clone(),
            status: CaseStatus::Passed,
            error_kind: None,
            detail: None,
            task_id: None,
            datasource: None,
            rows_verified: None,
            started_at,
            finished_at,
        };

        match result {
            Ok(outcome) => Self {
                task_id: Some(outcome.task_id),
                datasource: Some(outcome.datasource),
                rows_verified: outcome.rows_verified,
                ..base
            },
            Err(err) => {
                let task_id = match &err {
                    CaseError::OutcomeMismatch { task_id, .. }
                    | CaseError::VerificationTimeout { task_id, .. }
                    | CaseError::Verification { task_id, .. } => Some(task_id.clone()),
                    CaseError::Service { task_id, .. } => task_id.clone(),
                    CaseError::Configuration(_) | CaseError::Submission(_) => None,
                };
                let datasource = match &err {
                    CaseError::Verification { datasource, .. } => Some(datasource.clone()),
                    _ => None,
                };
                Self {
                    status: err.status(),
                    error_kind: Some(err.kind()),
                    detail: Some(err.to_string()),
                    task_id,
                    datasource,
                    ..base
                }
            }
        }
    }

    /// Report for a case whose task panicked or was aborted.
    pub fn crashed(case: &TestCase, reason: &str) -> Self {
        let now = Utc::now();
        Self {
            name: case.name.clone(),
            format: case.format.clone(),
            status: CaseStatus::Failed,
            error_kind: Some("crashed"),
            detail: Some(reason.to_string()),
            task_id: None,
            datasource: None,
            rows_verified: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconclusive: usize,
}

/// Reports for a whole matrix run, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    pub cases: Vec<CaseReport>,
    pub summary: MatrixSummary,
}

impl MatrixReport {
    pub fn new(cases: Vec<CaseReport>) -> Self {
        let mut summary = MatrixSummary {
            total: cases.len(),
            ..MatrixSummary::default()
        };
        for case in &cases {
            match case.status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
                CaseStatus::Inconclusive => summary.inconclusive += 1,
            }
        }
        Self { cases, summary }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn log_summary(&self) {
        for case in &self.cases {
            match case.status {
                CaseStatus::Passed => info!(case = %case.name, format = %case.format, "PASS"),
                status => warn!(
                    case = %case.name,
                    format = %case.format,
                    status = %status,
                    detail = case.detail.as_deref().unwrap_or(""),
                    "case did not pass"
                ),
            }
        }
        info!(
            total = self.summary.total,
            passed = self.summary.passed,
            failed = self.summary.failed,
            inconclusive = self.summary.inconclusive,
            "Matrix finished"
        );
    }
}

impl fmt::Display for MatrixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.cases.iter().map(|c| c.name.len()).max().unwrap_or(4);
        for case in &self.cases {
            write!(f, "{:<12} {:<width$} {:<8}", case.status.to_string(), case.name, case.format)?;
            if let Some(detail) = &case.detail {
                write!(f, " {detail}")?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{} cases: {} passed, {} failed, {} inconclusive",
            self.summary.total, self.summary.passed, self.summary.failed, self.summary.inconclusive
        )
    }
}
