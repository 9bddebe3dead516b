use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fixture::{Fixture, DEFAULT_BASE_DIR, WIKIPEDIA_ROW_COUNT};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub druid: DruidConfig,
    pub runner: RunnerConfig,
}

impl MatrixConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `INGEST_MATRIX_PROFILE`. When set (e.g. `CI`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("INGEST_MATRIX_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            druid: DruidConfig::from_env_profiled(p),
            runner: RunnerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  overlord:    {}", self.druid.overlord_url);
        tracing::info!("  broker:      {}", self.druid.broker_url);
        tracing::info!("  coordinator: {}", self.druid.coordinator_url);
        tracing::info!(
            "  runner:      timeout={}s, concurrency={}, expected_rows={}, unload_after={}",
            self.runner.timeout_seconds,
            self.runner.concurrency,
            self.runner.expected_row_count,
            self.runner.unload_after
        );
    }
}

// ── Druid endpoints ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DruidConfig {
    /// Overlord (task API). Usually the router works here too.
    pub overlord_url: String,
    /// Broker (SQL API).
    pub broker_url: String,
    /// Coordinator (datasource management).
    pub coordinator_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout_seconds: u64,
    /// First poll delay while waiting on a task.
    pub poll_initial_ms: u64,
    /// Upper bound on the poll delay.
    pub poll_max_ms: u64,
}

impl DruidConfig {
    fn from_env_profiled(p: &str) -> Self {
        let router = profiled_env_or(p, "DRUID_ROUTER_URL", "http://localhost:8888");
        Self {
            overlord_url: profiled_env_or(p, "DRUID_OVERLORD_URL", &router),
            broker_url: profiled_env_or(p, "DRUID_BROKER_URL", &router),
            coordinator_url: profiled_env_or(p, "DRUID_COORDINATOR_URL", &router),
            request_timeout_seconds: profiled_env_u64(p, "DRUID_REQUEST_TIMEOUT_SECONDS", 60),
            poll_initial_ms: profiled_env_u64(p, "DRUID_POLL_INITIAL_MS", 200),
            poll_max_ms: profiled_env_u64(p, "DRUID_POLL_MAX_MS", 2000),
        }
    }

    /// All three endpoints behind one base URL.
    pub fn single_host(base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self {
            overlord_url: base.clone(),
            broker_url: base.clone(),
            coordinator_url: base,
            request_timeout_seconds: 60,
            poll_initial_ms: 200,
            poll_max_ms: 2000,
        }
    }
}

// ── Runner ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// How long one case may wait for its task to finish.
    pub timeout_seconds: u64,
    /// Cases in flight at once.
    pub concurrency: usize,
    /// Directory holding the per-format fixture folders, as seen by the service.
    pub data_base_dir: String,
    /// Appended to every generated datasource name.
    pub datasource_suffix: String,
    pub expected_row_count: usize,
    /// Drop each case's datasource after it ran.
    pub unload_after: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 600,
            concurrency: 2,
            data_base_dir: DEFAULT_BASE_DIR.to_string(),
            datasource_suffix: String::new(),
            expected_row_count: WIKIPEDIA_ROW_COUNT,
            unload_after: true,
        }
    }
}

impl RunnerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            timeout_seconds: profiled_env_u64(p, "MATRIX_TIMEOUT_SECONDS", d.timeout_seconds),
            concurrency: profiled_env_usize(p, "MATRIX_CONCURRENCY", d.concurrency).max(1),
            data_base_dir: profiled_env_or(p, "MATRIX_DATA_BASE_DIR", &d.data_base_dir),
            datasource_suffix: profiled_env_opt(p, "MATRIX_DATASOURCE_SUFFIX")
                .unwrap_or(d.datasource_suffix),
            expected_row_count: profiled_env_usize(
                p,
                "MATRIX_EXPECTED_ROWS",
                d.expected_row_count,
            ),
            unload_after: profiled_env_bool(p, "MATRIX_UNLOAD_AFTER", d.unload_after),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The wikipedia fixture adjusted to this environment. Metric sums are
    /// only checked when the row count is the stock one.
    pub fn fixture(&self) -> Fixture {
        let mut fixture = Fixture {
            base_dir: self.data_base_dir.clone(),
            expected_row_count: self.expected_row_count,
            ..Fixture::wikipedia()
        };
        if self.expected_row_count != WIKIPEDIA_ROW_COUNT {
            fixture.metric_totals.clear();
        }
        fixture
    }
}
