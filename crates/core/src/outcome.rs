use std::fmt;

use serde::{Deserialize, Serialize};

/// The two partial-failure flags of an ingestion run.
///
/// Used both for the expectation declared by a test case and for what the
/// service actually reported. Expectations are fixed before submission and
/// only compared afterwards.
///
/// Deserializes from either `[false, false]` or
/// `{ "rows_rejected": false, "task_failed": false }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "OutcomeRepr")]
pub struct Outcome {
    /// Some rows were rejected as unparseable or processed with errors.
    pub rows_rejected: bool,
    /// The task as a whole failed.
    pub task_failed: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutcomeRepr {
    Pair(bool, bool),
    Named {
        #[serde(default)]
        rows_rejected: bool,
        #[serde(default)]
        task_failed: bool,
    },
}

impl From<OutcomeRepr> for Outcome {
    fn from(repr: OutcomeRepr) -> Self {
        match repr {
            OutcomeRepr::Pair(rows_rejected, task_failed)
            | OutcomeRepr::Named {
                rows_rejected,
                task_failed,
            } => Self {
                rows_rejected,
                task_failed,
            },
        }
    }
}

impl Outcome {
    pub const fn new(rows_rejected: bool, task_failed: bool) -> Self {
        Self {
            rows_rejected,
            task_failed,
        }
    }

    /// Clean run: nothing rejected, nothing failed.
    pub const fn clean() -> Self {
        Self::new(false, false)
    }
}

impl From<(bool, bool)> for Outcome {
    fn from((rows_rejected, task_failed): (bool, bool)) -> Self {
        Self::new(rows_rejected, task_failed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(rows_rejected={}, task_failed={})",
            self.rows_rejected, self.task_failed
        )
    }
}

/// Final status of an ingestion task as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalState {
    pub succeeded: bool,
    pub partial_failure_flags: (bool, bool),
    /// Error message from the service, if it gave one.
    #[serde(default)]
    pub message: Option<String>,
}

impl TerminalState {
    pub fn succeeded() -> Self {
        Self {
            succeeded: true,
            partial_failure_flags: (false, false),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            partial_failure_flags: (false, true),
            message: Some(message.into()),
        }
    }

    /// The flags to compare against an expectation.
    ///
    /// A task that did not succeed always counts as `task_failed`, whatever
    /// the reported flags say.
    pub fn outcome(&self) -> Outcome {
        let (rows_rejected, task_failed) = self.partial_failure_flags;
        Outcome::new(rows_rejected, task_failed || !self.succeeded)
    }
}
