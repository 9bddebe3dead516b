//! The standard all-formats matrix and matrix files.
//!
//! A matrix file lists cases as TOML `[[case]]` tables, or as a JSON object
//! with a `case` array:
//!
//! ```toml
//! [[case]]
//! name = "tsv"
//! format = "TSV"
//! expected = [false, false]
//!
//! [case.overlay]
//! findColumnsFromHeader = true
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use ingest_matrix_core::{
    ConfigurationError, FieldDescriptor, InputFormat, OptionsOverlay, SchemaDocument, TestCase,
};

const WIKIPEDIA_STRING_FIELDS: [&str; 13] = [
    "timestamp",
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
];

const WIKIPEDIA_INT_FIELDS: [&str; 3] = ["added", "deleted", "delta"];

/// Record schema of the wikipedia Avro fixture.
pub fn wikipedia_avro_schema() -> SchemaDocument {
    let fields = WIKIPEDIA_STRING_FIELDS
        .iter()
        .map(|name| FieldDescriptor::new(*name, "string"))
        .chain(
            WIKIPEDIA_INT_FIELDS
                .iter()
                .map(|name| FieldDescriptor::new(*name, "int")),
        )
        .collect();
    SchemaDocument::record("org.apache.druid.data.input", "wikipedia", fields)
}

/// One case per format, every one expected to ingest cleanly. Avro runs
/// twice: with an explicit schema and reading the schema embedded in the file.
pub fn standard_matrix() -> Vec<TestCase> {
    let with_header = || OptionsOverlay::new().with("findColumnsFromHeader", true);
    let with_schema = OptionsOverlay::new().with("schema", wikipedia_avro_schema().to_payload());

    vec![
        TestCase::new("avro_with_schema", InputFormat::Avro).overlay(with_schema),
        TestCase::new("avro_without_schema", InputFormat::Avro),
        TestCase::new("json", InputFormat::Json),
        TestCase::new("tsv", InputFormat::Tsv).overlay(with_header()),
        TestCase::new("parquet", InputFormat::Parquet),
        TestCase::new("orc", InputFormat::Orc),
        TestCase::new("csv", InputFormat::Csv).overlay(with_header()),
    ]
}

#[derive(Debug, Deserialize)]
struct MatrixFile {
    #[serde(default)]
    case: Vec<TestCase>,
}

pub fn parse_matrix_toml(text: &str) -> Result<Vec<TestCase>, ConfigurationError> {
    let file: MatrixFile =
        toml::from_str(text).map_err(|e| ConfigurationError::InvalidMatrix(e.to_string()))?;
    check_names(file.case)
}

pub fn parse_matrix_json(text: &str) -> Result<Vec<TestCase>, ConfigurationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidMatrix(e.to_string()))?;
    // A bare array of cases is accepted too.
    let file = if value.is_array() {
        MatrixFile {
            case: serde_json::from_value(value)
                .map_err(|e| ConfigurationError::InvalidMatrix(e.to_string()))?,
        }
    } else {
        serde_json::from_value(value).map_err(|e| ConfigurationError::InvalidMatrix(e.to_string()))?
    };
    check_names(file.case)
}

/// Load a matrix file, choosing the parser by extension (`.toml` or `.json`).
pub fn load_matrix(path: impl AsRef<Path>) -> Result<Vec<TestCase>, ConfigurationError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigurationError::InvalidMatrix(format!("cannot read {}: {e}", path.display()))
    })?;

    let cases = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_matrix_toml(&text)?,
        Some("json") => parse_matrix_json(&text)?,
        other => {
            return Err(ConfigurationError::InvalidMatrix(format!(
                "unknown matrix file extension: {}",
                other.unwrap_or("<none>")
            )))
        }
    };

    info!(path = %path.display(), cases = cases.len(), "Loaded matrix");
    Ok(cases)
}

/// Case names key the reports, so they must be present and unique.
fn check_names(cases: Vec<TestCase>) -> Result<Vec<TestCase>, ConfigurationError> {
    let mut seen = std::collections::HashSet::new();
    for case in &cases {
        if case.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidMatrix("case with empty name".into()));
        }
        if !seen.insert(case.name.as_str()) {
            return Err(ConfigurationError::InvalidMatrix(format!(
                "duplicate case name: {}",
                case.name
            )));
        }
    }
    Ok(cases)
}
