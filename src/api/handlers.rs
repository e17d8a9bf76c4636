// src/api/handlers.rs

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::catalog::ExperimentDefinition;
use crate::store::{ExperimentResult, Run};
use crate::types::{RunId, RunStatus};

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub run_id: RunId,
    pub cancelled: bool,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Experiment Dashboard API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_experiments(State(state): State<AppState>) -> Json<Vec<ExperimentDefinition>> {
    Json(state.catalog.list().to_vec())
}

pub async fn get_experiment(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
) -> Result<Json<ExperimentDefinition>, ApiError> {
    Ok(Json(state.catalog.require(&experiment_id)?.clone()))
}

/// `POST /experiments/{experiment_id}/run`
///
/// The body, if any, is a JSON object of parameter overrides. Only keys the
/// experiment already defines are applied.
pub async fn run_experiment(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Run>), ApiError> {
    let experiment = state.catalog.require(&experiment_id)?;

    let overrides = parse_overrides(&body)?;
    let config = experiment.config.with_overrides(&overrides);

    let run = state.store.create(&experiment.id)?;

    if let Err(err) = state.executor.start(
        run.run_id,
        &experiment.id,
        config,
        Arc::clone(&state.job),
    ) {
        warn!(run_id = %run.run_id, error = %err, "run could not be started");
        // Don't leave the run pending forever.
        if let Ok(failed) = state.store.update_status(
            &run.run_id,
            RunStatus::Failed,
            0.0,
            format!("Rejected: {err}"),
        ) {
            state.publisher.notify(run.run_id, failed.snapshot());
        }
        return Err(err.into());
    }

    info!(run_id = %run.run_id, experiment_id = %experiment.id, "run accepted");
    Ok((StatusCode::ACCEPTED, Json(run)))
}

pub async fn run_status(
    State(state): State<AppState>,
    Path(raw_run_id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    let run_id = parse_run_id(&raw_run_id, "Run not found")?;
    Ok(Json(state.store.get(&run_id)?))
}

pub async fn run_results(
    State(state): State<AppState>,
    Path(raw_run_id): Path<String>,
) -> Result<Json<ExperimentResult>, ApiError> {
    let run_id = parse_run_id(&raw_run_id, "Results not found")?;
    Ok(Json(state.store.get_result(&run_id)?))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(raw_run_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let run_id = parse_run_id(&raw_run_id, "Run not found")?;
    // Unknown ids are a 404; known-but-idle runs just report `false`.
    state.store.get(&run_id)?;
    let cancelled = state.executor.cancel(&run_id);
    Ok(Json(CancelResponse { run_id, cancelled }))
}

/// Ids that don't parse can't name a run, so they are reported as unknown.
fn parse_run_id(raw: &str, not_found: &str) -> Result<RunId, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(not_found))
}

fn parse_overrides(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(ApiError::bad_request(
            "Request body must be a JSON object of parameter overrides",
        )),
        Err(err) => Err(ApiError::bad_request(format!("Invalid JSON body: {err}"))),
    }
}
