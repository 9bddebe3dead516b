use serde::Serialize;
use serde_json::Value;

use ingest_matrix_core::{QueryResult, ServiceError};

/// Body of `POST /druid/v2/sql`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlRequest {
    pub query: String,
    pub result_format: &'static str,
    pub header: bool,
}

impl SqlRequest {
    /// Every row of a datasource, header row first.
    pub fn select_all(datasource: &str) -> Self {
        Self {
            query: format!("SELECT * FROM \"{}\"", datasource.replace('"', "\"\"")),
            result_format: "array",
            header: true,
        }
    }
}

/// Parse an `array` result with `header: true`: the first row holds the
/// column names, the rest are data rows.
pub fn parse_sql_rows(body: Value) -> Result<QueryResult, ServiceError> {
    let Value::Array(mut rows) = body else {
        return Err(ServiceError::Parse("SQL response is not an array".into()));
    };
    if rows.is_empty() {
        return Ok(QueryResult::default());
    }

    let header = rows.remove(0);
    let columns = match header {
        Value::Array(names) => names
            .into_iter()
            .map(|n| match n {
                Value::String(s) => Ok(s),
                other => Err(ServiceError::Parse(format!("non-string column name: {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(ServiceError::Parse("SQL header row is not an array".into())),
    };

    let rows = rows
        .into_iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells),
            _ => Err(ServiceError::Parse("SQL data row is not an array".into())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryResult::new(columns, rows))
}
