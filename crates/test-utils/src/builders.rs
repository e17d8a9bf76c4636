#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use testdrive::catalog::{ExperimentConfig, ExperimentDefinition};
use testdrive::config::ServiceConfig;
use testdrive::exec::{ExecutorLimits, ExperimentJob, TaskExecutor};
use testdrive::publish::{StatusPublisher, StreamSettings, SubscriptionEvent};
use testdrive::store::{Run, RunReader, RunStore};
use testdrive::types::RunId;

/// Stream pacing short enough for tests.
pub fn fast_stream_settings() -> StreamSettings {
    StreamSettings {
        poll_interval: Duration::from_millis(20),
        error_backoff: Duration::from_millis(10),
        max_errors: 5,
    }
}

/// Default service config with fast streams and a quick simulation.
pub fn test_config() -> ServiceConfig {
    let mut cfg = ServiceConfig::default();
    cfg.stream.poll_interval_ms = 20;
    cfg.stream.error_backoff_ms = 10;
    cfg.simulation.phase_delay_ms = 5;
    cfg
}

/// Builder for `ExperimentDefinition`.
pub struct ExperimentBuilder {
    def: ExperimentDefinition,
}

impl ExperimentBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            def: ExperimentDefinition {
                id: id.to_string(),
                name: format!("Experiment {id}"),
                description: "test experiment".to_string(),
                category: "Testing".to_string(),
                tags: Vec::new(),
                config: ExperimentConfig {
                    name: format!("{id} config"),
                    description: "test config".to_string(),
                    parameters: Map::new(),
                    estimated_duration: None,
                },
                created_at: chrono::Utc::now(),
            },
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.def.config.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.def.tags.push(tag.to_string());
        self
    }

    pub fn build(self) -> ExperimentDefinition {
        self.def
    }
}

/// Store, publisher and executor wired together the way the service does.
pub struct Harness {
    pub store: RunStore,
    pub publisher: StatusPublisher,
    pub executor: TaskExecutor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_limits(ExecutorLimits::default())
    }

    pub fn with_limits(limits: ExecutorLimits) -> Self {
        let store = RunStore::new();
        let reader: Arc<dyn RunReader> = Arc::new(store.clone());
        Self::assemble(store, reader, limits)
    }

    /// Observers read through `reader` instead of the store itself.
    pub fn with_reader(store: RunStore, reader: Arc<dyn RunReader>) -> Self {
        Self::assemble(store, reader, ExecutorLimits::default())
    }

    fn assemble(store: RunStore, reader: Arc<dyn RunReader>, limits: ExecutorLimits) -> Self {
        let publisher = StatusPublisher::new(reader, fast_stream_settings());
        let executor = TaskExecutor::new(store.clone(), publisher.clone(), limits);
        Self {
            store,
            publisher,
            executor,
        }
    }

    /// Create a run and start `job` for it.
    pub fn launch(&self, experiment_id: &str, job: Arc<dyn ExperimentJob>) -> RunId {
        let run = self.store.create(experiment_id).expect("create run");
        let config = ExperimentBuilder::new(experiment_id).build().config;
        self.executor
            .start(run.run_id, experiment_id, config, job)
            .expect("start run");
        run.run_id
    }

    /// Poll the store until `pred` holds for the run.
    pub async fn wait_for(&self, run_id: &RunId, pred: impl Fn(&Run) -> bool) -> Run {
        loop {
            let run = self.store.get(run_id).expect("run exists");
            if pred(&run) {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait until the executor no longer tracks the run.
    pub async fn wait_until_idle(&self, run_id: &RunId) {
        while self.executor.is_running(run_id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Subscribe and drain the subscription to its end.
    pub async fn collect(&self, run_id: RunId) -> Vec<SubscriptionEvent> {
        let mut subscription = self.publisher.subscribe(run_id).expect("subscribe");
        let mut events = Vec::new();
        while let Some(event) = subscription.next().await {
            events.push(event);
        }
        events
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
