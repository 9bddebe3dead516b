//! Integration tests for ingest-matrix-druid.
//!
//! The client is driven against an in-process mock of the Druid HTTP APIs,
//! so no cluster is needed.

mod client;
mod mock_druid;
