use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CaseError;
use crate::result::QueryResult;
use crate::service::JobHandle;

/// Directory that holds one sub-directory of fixture files per format.
pub const DEFAULT_BASE_DIR: &str = "/resources/data/batch_index";

/// Rows in the wikipedia batch-index fixture, identical for every format.
pub const WIKIPEDIA_ROW_COUNT: usize = 10;

/// Sums of the wikipedia metrics over both fixture days (five edits a day,
/// repeated on 2013-08-31 and 2013-09-01).
pub const WIKIPEDIA_METRIC_TOTALS: [(&str, f64); 3] =
    [("added", 3090.0), ("deleted", 712.0), ("delta", 2378.0)];

/// The dataset every format case ingests and what a query over it must show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Prefix of the per-job datasource name.
    pub datasource_prefix: String,
    pub base_dir: String,
    /// ISO-8601 interval covering every row.
    pub interval: String,
    pub timestamp_column: String,
    pub dimensions: Vec<String>,
    /// Summed metrics, each read from the input column of the same name.
    pub metrics: Vec<String>,
    pub expected_row_count: usize,
    /// Columns the query result must contain.
    pub required_columns: Vec<String>,
    /// Expected sum of each listed metric column over all rows.
    #[serde(default)]
    pub metric_totals: IndexMap<String, f64>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::wikipedia()
    }
}

impl Fixture {
    pub fn wikipedia() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            datasource_prefix: "wikipedia_index_test".into(),
            base_dir: DEFAULT_BASE_DIR.into(),
            interval: "2013-08-31/2013-09-02".into(),
            timestamp_column: "timestamp".into(),
            dimensions: strings(&[
                "page",
                "language",
                "user",
                "unpatrolled",
                "newPage",
                "robot",
                "anonymous",
                "namespace",
                "continent",
                "country",
                "region",
                "city",
            ]),
            metrics: strings(&["added", "deleted", "delta"]),
            expected_row_count: WIKIPEDIA_ROW_COUNT,
            required_columns: strings(&["__time", "page", "added", "deleted", "delta"]),
            metric_totals: WIKIPEDIA_METRIC_TOTALS
                .iter()
                .map(|(m, total)| (m.to_string(), *total))
                .collect(),
        }
    }

    /// Unique datasource name for one job: `<prefix>_<uuid><suffix>`.
    pub fn datasource_name(&self, suffix: &str) -> String {
        format!("{}_{}{}", self.datasource_prefix, Uuid::new_v4(), suffix)
    }

    /// Check a query over the ingested datasource against the fixture:
    /// required columns, row count, then metric sums.
    ///
    /// Returns the observed row count.
    pub fn verify(&self, handle: &JobHandle, result: &QueryResult) -> Result<usize, CaseError> {
        let fail = |reason: String| CaseError::Verification {
            task_id: handle.task_id.clone(),
            datasource: handle.datasource.clone(),
            reason,
        };

        let missing = result.missing_columns(&self.required_columns);
        if !missing.is_empty() {
            return Err(fail(format!("missing columns: {}", missing.join(", "))));
        }

        if result.row_count() != self.expected_row_count {
            return Err(fail(format!(
                "expected {} rows, got {}",
                self.expected_row_count,
                result.row_count()
            )));
        }

        for (metric, expected) in &self.metric_totals {
            let Some(col) = result.column_index(metric) else {
                return Err(fail(format!("missing columns: {metric}")));
            };
            let actual: f64 = result
                .rows
                .iter()
                .filter_map(|row| row.get(col).and_then(Value::as_f64))
                .sum();
            if (actual - expected).abs() > 1e-6 * expected.abs().max(1.0) {
                return Err(fail(format!(
                    "metric `{metric}` sums to {actual}, expected {expected}"
                )));
            }
        }

        Ok(result.row_count())
    }
}
