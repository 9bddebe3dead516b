//! The standard matrix against a real cluster.
//!
//! Needs `DRUID_ROUTER_URL` (or the per-service URLs) and the wikipedia
//! fixture mounted under `MATRIX_DATA_BASE_DIR` on the indexer. Run with
//! `cargo test -p ingest-matrix-runner -- --ignored`.

use std::sync::Arc;

use ingest_matrix_core::config::load_dotenv;
use ingest_matrix_core::{MatrixConfig, Outcome};
use ingest_matrix_druid::DruidClient;
use ingest_matrix_runner::{standard_matrix, MatrixRunner};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn live_runner() -> (Arc<MatrixRunner>, MatrixConfig) {
    load_dotenv();
    init_tracing();
    let config = MatrixConfig::from_env();
    config.log_summary();

    let client = DruidClient::new(config.druid.clone());
    let runner = MatrixRunner::from_config(Arc::new(client), &config);
    (Arc::new(runner), config)
}

#[tokio::test]
#[ignore]
async fn test_live_standard_matrix() {
    let (runner, config) = live_runner();

    let report = runner
        .run_matrix(standard_matrix(), config.runner.concurrency)
        .await;

    println!("{report}");
    assert!(report.all_passed(), "{report}");
}

#[tokio::test]
#[ignore]
async fn test_live_json_case() -> anyhow::Result<()> {
    let (runner, _config) = live_runner();

    let outcome = runner.run_case("JSON", None, Outcome::clean()).await?;
    assert_eq!(outcome.rows_verified, Some(runner.fixture().expected_row_count));
    Ok(())
}
