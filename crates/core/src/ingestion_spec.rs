//! Builds the `index_parallel` task payload submitted for one case.

use serde::Serialize;
use serde_json::{json, Value};

use crate::fixture::Fixture;
use crate::format::InputFormat;
use crate::overlay::OptionsOverlay;

/// Parallel subtasks requested per ingestion task.
const MAX_CONCURRENT_SUBTASKS: u32 = 10;

/// A complete ingestion request, ready for
/// [`IngestionService::submit`](crate::service::IngestionService::submit).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionSpec {
    pub datasource: String,
    pub format: InputFormat,
    pub payload: Value,
}

impl IngestionSpec {
    /// Assemble the task for `format` reading the fixture's files for that
    /// format into `datasource`. `input_format` is the already resolved
    /// options map (see [`InputFormat::resolve_options`]).
    pub fn build(
        format: InputFormat,
        input_format: &OptionsOverlay,
        fixture: &Fixture,
        datasource: impl Into<String>,
    ) -> Self {
        let datasource = datasource.into();

        let mut metrics = vec![json!({ "type": "count", "name": "count" })];
        metrics.extend(fixture.metrics.iter().map(|m| {
            json!({ "type": "doubleSum", "name": m, "fieldName": m })
        }));

        let payload = json!({
            "type": "index_parallel",
            "spec": {
                "dataSchema": {
                    "dataSource": datasource,
                    "timestampSpec": {
                        "column": fixture.timestamp_column,
                        "format": "auto"
                    },
                    "dimensionsSpec": {
                        "dimensions": fixture.dimensions
                    },
                    "metricsSpec": metrics,
                    "granularitySpec": {
                        "segmentGranularity": "DAY",
                        "queryGranularity": "second",
                        "intervals": [fixture.interval]
                    }
                },
                "ioConfig": {
                    "type": "index_parallel",
                    "inputSource": {
                        "type": "local",
                        "filter": format!("*{}", format.file_extension()),
                        "baseDir": format!("{}{}", fixture.base_dir, format.folder_suffix())
                    },
                    "inputFormat": input_format.to_value(),
                    "appendToExisting": false,
                    "dropExisting": false
                },
                "tuningConfig": {
                    "type": "index_parallel",
                    "maxNumConcurrentSubTasks": MAX_CONCURRENT_SUBTASKS,
                    "partitionsSpec": { "type": "dynamic" },
                    "forceGuaranteedRollup": false,
                    "splitHintSpec": { "type": "maxSize", "maxNumFiles": 1 }
                }
            }
        });

        Self {
            datasource,
            format,
            payload,
        }
    }

    /// The `inputFormat` object as it will be submitted.
    pub fn input_format(&self) -> Option<&Value> {
        self.payload.pointer("/spec/ioConfig/inputFormat")
    }
}
