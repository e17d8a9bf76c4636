// src/store/mod.rs

//! Authoritative in-memory registry of run state.
//!
//! The store is a ledger, not a validator: it accepts whatever progress value
//! the job reports. It does enforce two things:
//! - a run id is never handed out twice;
//! - once a run is `completed` or `failed`, nothing moves it again.
//!
//! Every operation holds the record's map guard for its full
//! read-modify-write, so per-record updates are atomic while different runs
//! can be mutated concurrently.

pub mod run;

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::errors::{Result, TestdriveError};
use crate::types::{RunId, RunStatus};

pub use run::{ExperimentResult, Run};

/// How many times `create` retries when a freshly generated id collides.
const MAX_ID_ATTEMPTS: usize = 8;

/// Read access to run records.
///
/// The publisher reads through this trait rather than the concrete store so
/// tests can substitute a reader that fails on demand.
pub trait RunReader: Send + Sync + 'static {
    fn read(&self, run_id: &RunId) -> Result<Run>;
}

#[derive(Debug)]
struct RunEntry {
    run: Run,
    result: Option<ExperimentResult>,
}

/// Cheaply cloneable handle to the shared run table.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    runs: Arc<DashMap<RunId, RunEntry>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new run in `pending` state with `started_at = now`.
    pub fn create(&self, experiment_id: &str) -> Result<Run> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let run_id = RunId::new();
            match self.runs.entry(run_id) {
                Entry::Occupied(_) => {
                    warn!(%run_id, "run id collision; generating another");
                }
                Entry::Vacant(slot) => {
                    let run = Run::pending(run_id, experiment_id);
                    slot.insert(RunEntry {
                        run: run.clone(),
                        result: None,
                    });
                    debug!(%run_id, experiment_id, "run created");
                    return Ok(run);
                }
            }
        }

        Err(TestdriveError::IdSpaceExhausted)
    }

    /// Overwrite the mutable status fields of a run.
    ///
    /// Terminal statuses stamp `completed_at`; `failed` also records the step
    /// text as the run's error message. Writes to an already-terminal run are
    /// rejected with [`TestdriveError::RunTerminal`].
    pub fn update_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        progress: f64,
        step: impl Into<String>,
    ) -> Result<Run> {
        let mut entry = self
            .runs
            .get_mut(run_id)
            .ok_or(TestdriveError::RunNotFound(*run_id))?;
        let run = &mut entry.run;

        if run.is_terminal() {
            return Err(TestdriveError::RunTerminal {
                run_id: *run_id,
                status: run.status,
            });
        }

        let step = step.into();
        run.status = status;
        run.progress = progress;

        if status.is_terminal() {
            run.completed_at = Some(Utc::now());
        }
        if status == RunStatus::Failed {
            run.error_message = Some(step.clone());
        }
        run.current_step = Some(step);

        debug!(
            %run_id,
            status = %run.status,
            progress = run.progress,
            step = run.current_step.as_deref().unwrap_or(""),
            "run status updated"
        );

        Ok(run.clone())
    }

    /// Attach a result to its run and force the run to `completed`.
    ///
    /// A result is authoritative for success: whatever non-failed status the
    /// run had, it ends up `completed` with progress 100. A failed run, or a
    /// run that already has a result, is left untouched.
    pub fn save_result(&self, result: ExperimentResult) -> Result<Run> {
        self.complete_with_result(result, None)
    }

    /// Like [`save_result`](Self::save_result), but also sets the run's step
    /// when `final_step` is given. Status, step and result change under one
    /// guard, so no reader sees `completed` without the result.
    pub fn complete_with_result(
        &self,
        result: ExperimentResult,
        final_step: Option<String>,
    ) -> Result<Run> {
        let run_id = result.run_id;
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or(TestdriveError::RunNotFound(run_id))?;

        if entry.run.status == RunStatus::Failed || entry.result.is_some() {
            return Err(TestdriveError::RunTerminal {
                run_id,
                status: entry.run.status,
            });
        }

        let metrics = result.metrics.clone();
        entry.result = Some(result);

        let run = &mut entry.run;
        run.status = RunStatus::Completed;
        run.progress = 100.0;
        run.completed_at.get_or_insert_with(Utc::now);
        run.results = Some(metrics);
        if let Some(step) = final_step {
            run.current_step = Some(step);
        }

        debug!(%run_id, "result saved; run completed");
        Ok(run.clone())
    }

    pub fn get(&self, run_id: &RunId) -> Result<Run> {
        self.runs
            .get(run_id)
            .map(|entry| entry.run.clone())
            .ok_or(TestdriveError::RunNotFound(*run_id))
    }

    pub fn get_result(&self, run_id: &RunId) -> Result<ExperimentResult> {
        self.runs
            .get(run_id)
            .and_then(|entry| entry.result.clone())
            .ok_or(TestdriveError::ResultNotFound(*run_id))
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Vec<Run> {
        let mut runs: Vec<Run> = self.runs.iter().map(|e| e.run.clone()).collect();
        runs.sort_by_key(|run| run.started_at);
        runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl RunReader for RunStore {
    fn read(&self, run_id: &RunId) -> Result<Run> {
        self.get(run_id)
    }
}
