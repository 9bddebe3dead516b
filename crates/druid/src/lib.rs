//! Druid-backed [`IngestionService`](ingest_matrix_core::IngestionService).
//!
//! Talks to the Overlord task API, the Broker SQL API and the Coordinator
//! datasource API over HTTP.

pub mod client;
pub mod sql;
pub mod task;

pub use client::DruidClient;
pub use sql::{parse_sql_rows, SqlRequest};
pub use task::{rows_processed, rows_rejected, TaskState, TaskStatusResponse};
