// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::catalog::{Catalog, ExperimentDefinition};
use crate::exec::ExecutorLimits;
use crate::publish::StreamSettings;

/// Configuration exactly as read from `Testdrive.toml`.
///
/// ```toml
/// [server]
/// host = "127.0.0.1"
/// port = 8000
/// cors_origins = ["http://localhost:8501"]
///
/// [executor]
/// max_concurrent_runs = 5
/// run_timeout_secs = 3600
///
/// [stream]
/// poll_interval_ms = 500
/// error_backoff_ms = 1000
/// max_errors = 5
///
/// [simulation]
/// phase_delay_ms = 3000
///
/// [[experiment]]
/// id = "bank-portal-migration"
/// name = "Bank Portal Migration Strategy"
/// description = "..."
/// category = "Customer Migration"
/// config = { name = "Portal Migration A/B Test", description = "...", parameters = { sample_size = 2500 } }
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub simulation: SimulationSection,

    /// `[[experiment]]` tables. When empty, the built-in catalog is used.
    #[serde(default, rename = "experiment")]
    pub experiments: Vec<ExperimentDefinition>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. The dashboard front-end runs on 8501.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:8501".to_string()]
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExecutorSection {
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// `0` disables the timeout.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

fn default_max_concurrent_runs() -> usize {
    5
}

fn default_run_timeout_secs() -> u64 {
    3600
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StreamSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    /// Interval between SSE keep-alive comments.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_max_errors() -> u32 {
    5
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            max_errors: default_max_errors(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// `[simulation]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SimulationSection {
    /// Time spent in each of the mock job's phases.
    #[serde(default = "default_phase_delay_ms")]
    pub phase_delay_ms: u64,
}

fn default_phase_delay_ms() -> u64 {
    3000
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            phase_delay_ms: default_phase_delay_ms(),
        }
    }
}

/// Validated configuration. Build it from a [`RawConfigFile`] with
/// `ServiceConfig::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub executor: ExecutorSection,
    pub stream: StreamSection,
    pub simulation: SimulationSection,
    pub catalog: Catalog,
}

impl ServiceConfig {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        let catalog = if raw.experiments.is_empty() {
            Catalog::builtin()
        } else {
            Catalog::new(raw.experiments)
        };

        Self {
            server: raw.server,
            executor: raw.executor,
            stream: raw.stream,
            simulation: raw.simulation,
            catalog,
        }
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            poll_interval: Duration::from_millis(self.stream.poll_interval_ms),
            error_backoff: Duration::from_millis(self.stream.error_backoff_ms),
            max_errors: self.stream.max_errors,
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.stream.keep_alive_secs)
    }

    pub fn executor_limits(&self) -> ExecutorLimits {
        let run_timeout = match self.executor.run_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ExecutorLimits {
            max_concurrent_runs: self.executor.max_concurrent_runs,
            run_timeout,
        }
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.simulation.phase_delay_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}
