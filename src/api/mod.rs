// src/api/mod.rs

//! HTTP surface.
//!
//! ```text
//! GET  /                                  service banner
//! GET  /health                            liveness
//! GET  /experiments                       catalog
//! GET  /experiments/{experiment_id}       one definition
//! POST /experiments/{experiment_id}/run   start a run (202)
//! GET  /experiments/run/{run_id}/status   current run record
//! GET  /experiments/run/{run_id}/stream   SSE status stream
//! GET  /experiments/run/{run_id}/results  result of a completed run
//! POST /experiments/run/{run_id}/cancel   request cancellation
//! ```

pub mod error;
pub mod handlers;
pub mod stream;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::exec::{ExperimentJob, SimulationJob, TaskExecutor};
use crate::publish::StatusPublisher;
use crate::store::{RunReader, RunStore};

pub use error::ApiError;

/// Shared handles every handler works with.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub store: RunStore,
    pub publisher: StatusPublisher,
    pub executor: TaskExecutor,
    pub job: Arc<dyn ExperimentJob>,
    pub keep_alive: Duration,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("experiments", &self.catalog.len())
            .field("runs", &self.store.len())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire store, publisher and executor together for `config`, running
    /// `job` for every run.
    pub fn new(config: &ServiceConfig, job: Arc<dyn ExperimentJob>) -> Self {
        let store = RunStore::new();
        let reader: Arc<dyn RunReader> = Arc::new(store.clone());
        let publisher = StatusPublisher::new(reader, config.stream_settings());
        let executor = TaskExecutor::new(
            store.clone(),
            publisher.clone(),
            config.executor_limits(),
        );

        Self {
            catalog: Arc::new(config.catalog.clone()),
            store,
            publisher,
            executor,
            job,
            keep_alive: config.keep_alive(),
        }
    }

    /// State running the mock [`SimulationJob`].
    pub fn with_simulation(config: &ServiceConfig) -> Self {
        Self::new(config, Arc::new(SimulationJob::new(config.phase_delay())))
    }
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/experiments", get(handlers::list_experiments))
        .route("/experiments/", get(handlers::list_experiments))
        .route("/experiments/{experiment_id}", get(handlers::get_experiment))
        .route("/experiments/{experiment_id}/run", post(handlers::run_experiment))
        .route("/experiments/run/{run_id}/status", get(handlers::run_status))
        .route("/experiments/run/{run_id}/stream", get(stream::stream_run))
        .route("/experiments/run/{run_id}/results", get(handlers::run_results))
        .route("/experiments/run/{run_id}/cancel", post(handlers::cancel_run))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
