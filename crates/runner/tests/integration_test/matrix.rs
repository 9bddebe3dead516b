//! Whole-matrix runs: ordering, isolation, summaries.

use std::sync::Arc;
use std::time::Duration;

use ingest_matrix_core::{CaseStatus, Fixture, InputFormat, OptionsOverlay, TerminalState, TestCase};
use ingest_matrix_runner::{
    load_matrix, standard_matrix, InMemoryIngestionService, MatrixRunner, MatrixSummary,
};

fn runner(service: InMemoryIngestionService) -> (Arc<MatrixRunner>, Arc<InMemoryIngestionService>) {
    let service = Arc::new(service);
    let runner = MatrixRunner::new(service.clone(), Fixture::wikipedia(), Duration::from_secs(5));
    (Arc::new(runner), service)
}

#[tokio::test]
async fn test_standard_matrix_passes() {
    let (runner, service) = runner(InMemoryIngestionService::new());

    let report = runner.run_matrix(standard_matrix(), 3).await;

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.summary.total, 7);
    assert_eq!(service.submission_count(), 7);

    let names: Vec<_> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        ["avro_with_schema", "avro_without_schema", "json", "tsv", "parquet", "orc", "csv"]
    );
    assert!(report.cases.iter().all(|c| c.rows_verified == Some(10)));
}

#[tokio::test]
async fn test_failures_stay_in_their_case() {
    let (runner, _service) = runner(
        InMemoryIngestionService::new()
            .rejecting(InputFormat::Parquet)
            .with_terminal(InputFormat::Orc, TerminalState::failed("corrupt stripe")),
    );

    let mut cases = standard_matrix();
    cases.push(TestCase::with_format_id("xml", "XML"));

    let report = runner.run_matrix(cases, 2).await;

    assert_eq!(
        report.summary,
        MatrixSummary { total: 8, passed: 5, failed: 3, inconclusive: 0 }
    );
    assert_eq!(report.case("parquet").unwrap().error_kind, Some("submission"));
    assert_eq!(report.case("orc").unwrap().error_kind, Some("outcome_mismatch"));
    assert_eq!(report.case("xml").unwrap().error_kind, Some("configuration"));
    assert_eq!(report.case("json").unwrap().status, CaseStatus::Passed);
    assert_eq!(report.cases.last().unwrap().name, "xml");
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_are_inconclusive() {
    let (runner, service) = runner(InMemoryIngestionService::new().stalled());

    let cases = vec![
        TestCase::new("json", InputFormat::Json),
        TestCase::new("csv", InputFormat::Csv)
            .overlay(OptionsOverlay::new().with("findColumnsFromHeader", true)),
    ];
    let report = runner.run_matrix(cases, 0).await;

    assert_eq!(report.summary.inconclusive, 2);
    assert!(!report.all_passed());
    assert!(report
        .cases
        .iter()
        .all(|c| c.error_kind == Some("verification_timeout") && c.task_id.is_some()));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(service.cancelled().len(), 2);
}

#[tokio::test]
async fn test_matrix_file_runs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("smoke.toml");
    std::fs::write(
        &path,
        r#"
        [[case]]
        name = "tsv_header"
        format = "tsv"
        [case.overlay]
        findColumnsFromHeader = true

        [[case]]
        name = "json_failing"
        format = "JSON"
        expected = [false, true]
        "#,
    )?;

    let (runner, _service) = runner(
        InMemoryIngestionService::new()
            .with_terminal(InputFormat::Json, TerminalState::failed("no files")),
    );
    let report = runner.run_matrix(load_matrix(&path)?, 1).await;

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.case("json_failing").unwrap().rows_verified, None);
    Ok(())
}
