//! Integration tests for ingest-matrix-runner.
//!
//! Everything runs against the in-memory service except `live_druid`, whose
//! tests are `#[ignore]`d and need a reachable Druid cluster configured
//! through the environment.

mod live_druid;
mod matrix;
