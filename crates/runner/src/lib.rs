//! Format test matrix runner.
//!
//! Drives one ingestion task per [`TestCase`](ingest_matrix_core::TestCase)
//! through an [`IngestionService`](ingest_matrix_core::IngestionService),
//! checks the terminal outcome against the case's expectation, and verifies
//! the ingested rows.
//!
//! - **runner**: [`MatrixRunner::run_case`], the per-case workflow
//! - **matrix**: the standard all-formats matrix and matrix-file loading
//! - **report**: per-case and whole-matrix reports
//! - **memory**: an in-memory service for exercising the runner without a cluster

pub mod matrix;
pub mod memory;
pub mod report;
pub mod runner;

pub use matrix::{load_matrix, parse_matrix_json, parse_matrix_toml, standard_matrix, wikipedia_avro_schema};
pub use memory::InMemoryIngestionService;
pub use report::{CaseReport, MatrixReport, MatrixSummary};
pub use runner::{CaseOutcome, MatrixRunner};
