//! Core model for the input-format ingestion matrix.
//!
//! Holds everything the runner and the service clients share: the supported
//! [`InputFormat`]s and their default option templates, option overlays,
//! Avro schema documents, expected/actual outcome flags, the ingestion task
//! payload builder, the post-ingestion [`Fixture`], configuration, and the
//! [`IngestionService`] seam to the external indexing service.

pub mod case;
pub mod config;
pub mod error;
pub mod fixture;
pub mod format;
pub mod ingestion_spec;
pub mod outcome;
pub mod overlay;
pub mod result;
pub mod schema;
pub mod service;

pub use case::TestCase;
pub use config::{DruidConfig, MatrixConfig, RunnerConfig};
pub use error::*;
pub use fixture::Fixture;
pub use format::InputFormat;
pub use ingestion_spec::IngestionSpec;
pub use outcome::{Outcome, TerminalState};
pub use overlay::OptionsOverlay;
pub use result::QueryResult;
pub use schema::{FieldDescriptor, SchemaDocument};
pub use service::{IngestionService, JobHandle};
