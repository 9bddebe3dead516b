//! Minimal in-process stand-in for the Overlord, Broker and Coordinator APIs.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Debug)]
pub struct MockState {
    /// Status polls answered with RUNNING before the final status.
    pub running_polls: usize,
    pub final_status: &'static str,
    pub reject_submissions: bool,
    pub unparseable_rows: u64,
    pub sql_rows: usize,
    /// Load-status polls answered before segments are reported fully
    /// loaded. The first answers 204 as if the datasource were unknown.
    pub loading_polls: usize,
    /// Segments never finish loading.
    pub never_loaded: bool,
    pub submitted: Vec<Value>,
    pub status_polls: usize,
    pub load_polls: usize,
    pub shutdowns: Vec<String>,
    pub unloaded: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            running_polls: 2,
            final_status: "SUCCESS",
            reject_submissions: false,
            unparseable_rows: 0,
            sql_rows: 10,
            loading_polls: 0,
            never_loaded: false,
            submitted: Vec::new(),
            status_polls: 0,
            load_polls: 0,
            shutdowns: Vec::new(),
            unloaded: Vec::new(),
        }
    }
}

pub type Shared = Arc<Mutex<MockState>>;

/// One day of wikipedia edits: page, added, deleted, delta. The fixture
/// repeats it for a second day.
const WIKIPEDIA_DAY: [(&str, i64, i64, i64); 5] = [
    ("Gypsy Danger", 57, 200, -143),
    ("Striker Eureka", 459, 129, 330),
    ("Cherno Alpha", 123, 12, 111),
    ("Crimson Typhoon", 905, 5, 900),
    ("Coyote Tango", 1, 10, -9),
];

/// Serve the mock on an ephemeral port and return its base URL.
pub async fn spawn(state: Shared) -> String {
    let app = Router::new()
        .route("/druid/indexer/v1/task", post(submit_task))
        .route("/druid/indexer/v1/task/{id}/status", get(task_status))
        .route("/druid/indexer/v1/task/{id}/reports", get(task_reports))
        .route("/druid/indexer/v1/task/{id}/shutdown", post(shutdown_task))
        .route("/druid/coordinator/v1/datasources/{ds}/loadstatus", get(load_status))
        .route("/druid/coordinator/v1/datasources/{ds}", delete(unload_datasource))
        .route("/druid/v2/sql", post(sql))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn submit_task(State(state): State<Shared>, Json(payload): Json<Value>) -> impl IntoResponse {
    let mut s = state.lock().unwrap();
    if s.reject_submissions {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Cannot construct instance of `InputFormat`"})),
        );
    }
    let datasource = payload
        .pointer("/spec/dataSchema/dataSource")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    s.submitted.push(payload);
    (StatusCode::OK, Json(json!({"task": format!("index_parallel_{datasource}")})))
}

async fn task_status(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    s.status_polls += 1;
    let code = if s.status_polls <= s.running_polls {
        "RUNNING"
    } else {
        s.final_status
    };
    let error_msg = (code == "FAILED").then_some("No valid input files found");
    Json(json!({
        "task": id,
        "status": {"id": id, "statusCode": code, "status": code, "errorMsg": error_msg, "duration": -1}
    }))
}

async fn task_reports(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let s = state.lock().unwrap();
    Json(json!({
        "ingestionStatsAndErrors": {
            "type": "ingestionStatsAndErrors",
            "taskId": id,
            "payload": {
                "ingestionState": "COMPLETED",
                "rowStats": {
                    "buildSegments": {
                        "processed": s.sql_rows,
                        "processedWithError": 0,
                        "thrownAway": 0,
                        "unparseable": s.unparseable_rows
                    }
                }
            }
        }
    }))
}

async fn shutdown_task(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    state.lock().unwrap().shutdowns.push(id.clone());
    Json(json!({"task": id}))
}

async fn load_status(State(state): State<Shared>, Path(ds): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    s.load_polls += 1;
    let loaded = if s.never_loaded || s.load_polls <= s.loading_polls {
        if s.load_polls == 1 {
            return StatusCode::NO_CONTENT.into_response();
        }
        50.0
    } else {
        100.0
    };
    let mut body = serde_json::Map::new();
    body.insert(ds, json!(loaded));
    Json(Value::Object(body)).into_response()
}

async fn unload_datasource(State(state): State<Shared>, Path(ds): Path<String>) -> StatusCode {
    state.lock().unwrap().unloaded.push(ds);
    StatusCode::OK
}

async fn sql(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let s = state.lock().unwrap();
    assert_eq!(body["resultFormat"], json!("array"));
    assert_eq!(body["header"], json!(true));

    let mut rows = vec![json!(["__time", "page", "added", "deleted", "delta"])];
    for i in 0..s.sql_rows {
        let (page, added, deleted, delta) = WIKIPEDIA_DAY[i % WIKIPEDIA_DAY.len()];
        let day = if i < WIKIPEDIA_DAY.len() { "2013-08-31" } else { "2013-09-01" };
        rows.push(json!([format!("{day}T01:02:33.000Z"), page, added, deleted, delta]));
    }
    Json(Value::Array(rows))
}
