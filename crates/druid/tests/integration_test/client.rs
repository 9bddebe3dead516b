//! DruidClient against the mock: submit, wait, query, cancel, unload.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingest_matrix_core::{
    DruidConfig, Fixture, IngestionService, IngestionSpec, InputFormat, JobHandle, ServiceError,
};
use ingest_matrix_druid::DruidClient;
use serde_json::json;

use crate::mock_druid::{self, MockState, Shared};

async fn setup(state: MockState) -> (DruidClient, Shared) {
    let shared = Arc::new(Mutex::new(state));
    let base = mock_druid::spawn(shared.clone()).await;
    let config = DruidConfig {
        poll_initial_ms: 5,
        poll_max_ms: 20,
        ..DruidConfig::single_host(base)
    };
    (DruidClient::new(config), shared)
}

fn json_spec() -> IngestionSpec {
    let fixture = Fixture::wikipedia();
    let options = InputFormat::Json.resolve_options(None).unwrap();
    IngestionSpec::build(InputFormat::Json, &options, &fixture, fixture.datasource_name(""))
}

#[tokio::test]
async fn submit_wait_and_query_happy_path() {
    let (client, state) = setup(MockState::default()).await;
    let spec = json_spec();

    let handle = client.submit(&spec).await.expect("submit");
    assert_eq!(handle.datasource, spec.datasource);
    assert_eq!(handle.task_id, format!("index_parallel_{}", spec.datasource));

    let terminal = client
        .await_terminal(&handle, Duration::from_secs(10))
        .await
        .expect("terminal");
    assert!(terminal.succeeded);
    assert_eq!(terminal.partial_failure_flags, (false, false));

    let result = client.query(&handle.datasource).await.expect("query");
    assert_eq!(result.row_count(), 10);
    assert_eq!(Fixture::wikipedia().verify(&handle, &result).unwrap(), 10);

    let s = state.lock().unwrap();
    assert_eq!(s.submitted.len(), 1);
    assert_eq!(s.submitted[0]["spec"]["ioConfig"]["inputFormat"]["type"], json!("json"));
    assert!(s.status_polls >= 3);
}

#[tokio::test]
async fn rejected_spec_is_reported_as_rejected() {
    let (client, _state) = setup(MockState {
        reject_submissions: true,
        ..MockState::default()
    })
    .await;

    let err = client.submit(&json_spec()).await.unwrap_err();
    match err {
        ServiceError::Rejected(msg) => assert!(msg.contains("400")),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_task_sets_task_failed_flag() {
    let (client, _state) = setup(MockState {
        running_polls: 0,
        final_status: "FAILED",
        ..MockState::default()
    })
    .await;

    let handle = client.submit(&json_spec()).await.unwrap();
    let terminal = client.await_terminal(&handle, Duration::from_secs(10)).await.unwrap();
    assert!(!terminal.succeeded);
    assert_eq!(terminal.partial_failure_flags, (false, true));
    assert_eq!(terminal.message.as_deref(), Some("No valid input files found"));
}

#[tokio::test]
async fn unparseable_rows_set_rows_rejected_flag() {
    let (client, _state) = setup(MockState {
        unparseable_rows: 3,
        ..MockState::default()
    })
    .await;

    let handle = client.submit(&json_spec()).await.unwrap();
    let terminal = client.await_terminal(&handle, Duration::from_secs(10)).await.unwrap();
    assert!(terminal.succeeded);
    assert!(terminal.outcome().rows_rejected);
}

#[tokio::test]
async fn still_running_task_times_out() {
    let (client, _state) = setup(MockState {
        running_polls: usize::MAX,
        ..MockState::default()
    })
    .await;

    let handle = client.submit(&json_spec()).await.unwrap();
    let err = client
        .await_terminal(&handle, Duration::from_millis(150))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn cancel_and_unload_hit_the_right_endpoints() {
    let (client, state) = setup(MockState::default()).await;
    let handle = JobHandle::new("index_parallel_abc", "wikipedia_index_test_abc");

    client.cancel(&handle).await.unwrap();
    client.unload(&handle.datasource).await.unwrap();

    let s = state.lock().unwrap();
    assert_eq!(s.shutdowns, vec!["index_parallel_abc".to_string()]);
    assert_eq!(s.unloaded, vec!["wikipedia_index_test_abc".to_string()]);
}

#[tokio::test]
async fn unreachable_service_is_an_http_error() {
    let client = DruidClient::new(DruidConfig {
        request_timeout_seconds: 2,
        ..DruidConfig::single_host("http://127.0.0.1:9")
    });
    let err = client.query("anything").await.unwrap_err();
    assert!(matches!(err, ServiceError::Http(_)), "got {err:?}");
}

#[tokio::test]
async fn waits_for_segments_to_load() {
    let (client, state) = setup(MockState {
        running_polls: 0,
        loading_polls: 3,
        ..MockState::default()
    })
    .await;

    let handle = client.submit(&json_spec()).await.unwrap();
    let terminal = client.await_terminal(&handle, Duration::from_secs(10)).await.unwrap();
    assert!(terminal.succeeded);
    assert_eq!(state.lock().unwrap().load_polls, 4);
}

#[tokio::test]
async fn segments_that_never_load_time_out() {
    let (client, state) = setup(MockState {
        running_polls: 0,
        never_loaded: true,
        ..MockState::default()
    })
    .await;

    let handle = client.submit(&json_spec()).await.unwrap();
    let err = client
        .await_terminal(&handle, Duration::from_millis(150))
        .await
        .unwrap_err();
    match err {
        ServiceError::Timeout { task_id, .. } => assert_eq!(task_id, handle.task_id),
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(state.lock().unwrap().load_polls > 1);
}

#[tokio::test]
async fn datasource_names_survive_the_url_path() {
    let (client, state) = setup(MockState {
        running_polls: 0,
        ..MockState::default()
    })
    .await;
    let fixture = Fixture::wikipedia();
    let datasource = fixture.datasource_name(" Россия?!\\x/y");
    let options = InputFormat::Json.resolve_options(None).unwrap();
    let spec = IngestionSpec::build(InputFormat::Json, &options, &fixture, datasource.clone());

    let handle = client.submit(&spec).await.unwrap();
    let terminal = client.await_terminal(&handle, Duration::from_secs(10)).await.unwrap();
    assert!(terminal.succeeded);
    assert_eq!(client.load_status(&datasource).await.unwrap(), Some(100.0));

    client.cancel(&handle).await.unwrap();
    client.unload(&datasource).await.unwrap();

    let s = state.lock().unwrap();
    assert_eq!(s.shutdowns, vec![format!("index_parallel_{datasource}")]);
    assert_eq!(s.unloaded, vec![datasource]);
}
