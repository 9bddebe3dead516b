//! In-process [`IngestionService`] with scripted task outcomes.
//!
//! Every submitted spec is recorded. Tasks reach the terminal state scripted
//! for their format (clean success by default), and successful datasources
//! answer queries with the fixture's columns.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ingest_matrix_core::{
    Fixture, IngestionService, IngestionSpec, InputFormat, JobHandle, QueryResult, ServiceError,
    TerminalState,
};

/// How tasks behave while the runner waits on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stall {
    /// Terminal after the configured delay.
    None,
    /// Never terminal; reports [`ServiceError::Timeout`] once the wait elapses.
    UntilTimeout,
    /// Never terminal and never returns.
    Forever,
}

#[derive(Debug, Default)]
struct State {
    submissions: Vec<IngestionSpec>,
    /// task id -> (datasource, terminal state)
    tasks: HashMap<String, (String, TerminalState)>,
    cancelled: Vec<String>,
    unloaded: Vec<String>,
}

pub struct InMemoryIngestionService {
    fixture: Fixture,
    row_count: usize,
    terminal_states: HashMap<InputFormat, TerminalState>,
    rejected_formats: HashSet<InputFormat>,
    terminal_delay: Duration,
    stall: Stall,
    submit_unreachable: bool,
    query_unreachable: bool,
    state: Mutex<State>,
}

impl Default for InMemoryIngestionService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIngestionService {
    pub fn new() -> Self {
        Self::for_fixture(Fixture::wikipedia())
    }

    /// Serve query results shaped like `fixture`.
    pub fn for_fixture(fixture: Fixture) -> Self {
        Self {
            row_count: fixture.expected_row_count,
            fixture,
            terminal_states: HashMap::new(),
            rejected_formats: HashSet::new(),
            terminal_delay: Duration::ZERO,
            stall: Stall::None,
            submit_unreachable: false,
            query_unreachable: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Tasks of `format` end in `terminal`.
    pub fn with_terminal(mut self, format: InputFormat, terminal: TerminalState) -> Self {
        self.terminal_states.insert(format, terminal);
        self
    }

    /// Submissions of `format` are refused.
    pub fn rejecting(mut self, format: InputFormat) -> Self {
        self.rejected_formats.insert(format);
        self
    }

    /// Rows returned for a successful datasource.
    pub fn with_row_count(mut self, rows: usize) -> Self {
        self.row_count = rows;
        self
    }

    pub fn with_terminal_delay(mut self, delay: Duration) -> Self {
        self.terminal_delay = delay;
        self
    }

    /// Tasks never finish; waits end in [`ServiceError::Timeout`].
    pub fn stalled(mut self) -> Self {
        self.stall = Stall::UntilTimeout;
        self
    }

    /// Tasks never finish and waits never return.
    pub fn unresponsive(mut self) -> Self {
        self.stall = Stall::Forever;
        self
    }

    /// Submissions fail at the transport level and are not recorded.
    pub fn unreachable_on_submit(mut self) -> Self {
        self.submit_unreachable = true;
        self
    }

    /// Queries fail at the transport level.
    pub fn unreachable_on_query(mut self) -> Self {
        self.query_unreachable = true;
        self
    }

    pub fn submissions(&self) -> Vec<IngestionSpec> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }

    /// `inputFormat` of the most recent submission.
    pub fn last_input_format(&self) -> Option<Value> {
        self.lock()
            .submissions
            .last()
            .and_then(|s| s.input_format().cloned())
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.lock().cancelled.clone()
    }

    pub fn unloaded(&self) -> Vec<String> {
        self.lock().unloaded.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("in-memory service lock poisoned")
    }

    fn result_rows(&self) -> QueryResult {
        let mut columns = vec!["__time".to_string()];
        columns.extend(self.fixture.dimensions.iter().cloned());
        columns.push("count".to_string());
        columns.extend(self.fixture.metrics.iter().cloned());

        // Metric cells split the fixture totals evenly so the sums check out.
        let per_row = |metric: &str| {
            self.fixture
                .metric_totals
                .get(metric)
                .map_or(1.0, |total| total / self.fixture.expected_row_count.max(1) as f64)
        };

        let row: Vec<Value> = columns
            .iter()
            .map(|c| match c.as_str() {
                "__time" => Value::from(1_377_910_800_000_i64),
                c if self.fixture.metrics.iter().any(|m| m == c) => Value::from(per_row(c)),
                "count" => Value::from(1),
                c => Value::from(c),
            })
            .collect();

        QueryResult::new(columns, vec![row; self.row_count])
    }
}

#[async_trait]
impl IngestionService for InMemoryIngestionService {
    async fn submit(&self, spec: &IngestionSpec) -> Result<JobHandle, ServiceError> {
        if self.submit_unreachable {
            return Err(ServiceError::Http("connection refused".into()));
        }
        let mut state = self.lock();
        state.submissions.push(spec.clone());

        if self.rejected_formats.contains(&spec.format) {
            return Err(ServiceError::Rejected(format!(
                "{} ingestion is disabled",
                spec.format
            )));
        }

        let task_id = format!("index_parallel_{}_{}", spec.datasource, state.submissions.len());
        let terminal = self
            .terminal_states
            .get(&spec.format)
            .cloned()
            .unwrap_or_else(TerminalState::succeeded);
        state
            .tasks
            .insert(task_id.clone(), (spec.datasource.clone(), terminal));

        debug!(task_id = %task_id, format = %spec.format, "In-memory task accepted");
        Ok(JobHandle::new(task_id, spec.datasource.clone()))
    }

    async fn await_terminal(
        &self,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<TerminalState, ServiceError> {
        let timed_out = || ServiceError::Timeout {
            task_id: handle.task_id.clone(),
            seconds: timeout.as_secs(),
        };

        match self.stall {
            Stall::Forever => std::future::pending().await,
            Stall::UntilTimeout => {
                tokio::time::sleep(timeout).await;
                return Err(timed_out());
            }
            Stall::None => {}
        }

        if self.terminal_delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(timed_out());
        }
        tokio::time::sleep(self.terminal_delay).await;

        self.lock()
            .tasks
            .get(&handle.task_id)
            .map(|(_, terminal)| terminal.clone())
            .ok_or_else(|| ServiceError::Api(format!("unknown task {}", handle.task_id)))
    }

    async fn query(&self, datasource: &str) -> Result<QueryResult, ServiceError> {
        if self.query_unreachable {
            return Err(ServiceError::Http("connection refused".into()));
        }
        let loaded = self
            .lock()
            .tasks
            .values()
            .any(|(ds, terminal)| ds == datasource && terminal.succeeded);
        if !loaded {
            return Err(ServiceError::Api(format!("datasource {datasource} not found")));
        }
        Ok(self.result_rows())
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), ServiceError> {
        self.lock().cancelled.push(handle.task_id.clone());
        Ok(())
    }

    async fn unload(&self, datasource: &str) -> Result<(), ServiceError> {
        self.lock().unloaded.push(datasource.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
