// src/exec/executor.rs

//! Registry of in-flight runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::ExperimentConfig;
use crate::errors::{Result, TestdriveError};
use crate::publish::StatusPublisher;
use crate::store::RunStore;
use crate::types::RunId;

use super::job::{ExperimentJob, JobContext};
use super::reporter::Reporter;
use super::task_runner::run_job;

/// Limits applied to every run the executor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorLimits {
    pub max_concurrent_runs: usize,
    /// `None` means a run may take as long as it likes.
    pub run_timeout: Option<Duration>,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 5,
            run_timeout: Some(Duration::from_secs(3600)),
        }
    }
}

/// Bookkeeping for one running unit.
///
/// - `instance` tells a finishing unit apart from a newer one started under
///   the same run id after a cancel.
/// - `cancel` is handed to the job through its context.
/// - `handle` is the Tokio task running the job, attached right after the
///   spawn; `None` while the slot is only reserved.
struct ActiveRun {
    instance: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct ExecutorInner {
    store: RunStore,
    publisher: StatusPublisher,
    limits: ExecutorLimits,
    next_instance: AtomicU64,
    // At most one ActiveRun per run id.
    active: Mutex<HashMap<RunId, ActiveRun>>,
}

impl ExecutorInner {
    fn release(&self, run_id: RunId, instance: u64) {
        let mut active = self.active.lock();
        if active.get(&run_id).is_some_and(|a| a.instance == instance) {
            active.remove(&run_id);
            debug!(%run_id, instance, "execution slot released");
        }
    }
}

/// Removes the registry entry when the unit ends, however it ends.
struct Registration {
    inner: Arc<ExecutorInner>,
    run_id: RunId,
    instance: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.release(self.run_id, self.instance);
    }
}

/// Starts, tracks and cancels the concurrency unit of each run.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<ExecutorInner>,
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("limits", &self.inner.limits)
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    pub fn new(store: RunStore, publisher: StatusPublisher, limits: ExecutorLimits) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                store,
                publisher,
                limits,
                next_instance: AtomicU64::new(1),
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn limits(&self) -> ExecutorLimits {
        self.inner.limits
    }

    /// Launch `job` for `run_id`.
    ///
    /// Fails with `StartupConflict` if the run already has a registered unit
    /// (the existing one is left alone) and with `ExecutorAtCapacity` when
    /// the concurrency limit is reached.
    pub fn start(
        &self,
        run_id: RunId,
        experiment_id: &str,
        config: ExperimentConfig,
        job: Arc<dyn ExperimentJob>,
    ) -> Result<()> {
        let cancel = CancellationToken::new();
        let instance = {
            let mut active = self.inner.active.lock();

            if active.contains_key(&run_id) {
                error!(%run_id, experiment_id, "run already has an active execution");
                return Err(TestdriveError::StartupConflict(run_id));
            }

            let max = self.inner.limits.max_concurrent_runs;
            if active.len() >= max {
                warn!(%run_id, experiment_id, max, "executor at capacity; run not started");
                return Err(TestdriveError::ExecutorAtCapacity(max));
            }

            // Reserve the slot before spawning, so a unit that finishes
            // instantly finds its own entry to release.
            let instance = self.inner.next_instance.fetch_add(1, Ordering::Relaxed);
            active.insert(
                run_id,
                ActiveRun {
                    instance,
                    cancel: cancel.clone(),
                    handle: None,
                },
            );
            instance
        };

        let ctx = JobContext {
            experiment_id: experiment_id.to_string(),
            run_id,
            config,
            reporter: Reporter::new(
                run_id,
                self.inner.store.clone(),
                self.inner.publisher.clone(),
            ),
            cancel,
        };

        let registration = Registration {
            inner: Arc::clone(&self.inner),
            run_id,
            instance,
        };
        let store = self.inner.store.clone();
        let publisher = self.inner.publisher.clone();
        let run_timeout = self.inner.limits.run_timeout;

        // Must not hold the registry lock here: a runtime that is shutting
        // down drops the future, and with it the registration, inside `spawn`.
        let handle = tokio::spawn(async move {
            let _registration = registration;
            run_job(job, ctx, run_timeout, store, publisher).await;
        });

        {
            let mut active = self.inner.active.lock();
            match active.get_mut(&run_id) {
                Some(slot) if slot.instance == instance => slot.handle = Some(handle),
                // Already finished, or cancelled before the handle landed.
                _ => debug!(%run_id, instance, "run released before its handle was attached"),
            }
        }

        info!(%run_id, experiment_id, instance, "run started");
        Ok(())
    }

    /// Request cooperative cancellation and forget the run immediately.
    ///
    /// Returns `false` if no unit is registered for `run_id`. The job may
    /// still write a final status after this returns; that write goes to
    /// the store only and never re-registers the run.
    pub fn cancel(&self, run_id: &RunId) -> bool {
        let removed = self.inner.active.lock().remove(run_id);

        match removed {
            Some(active) => {
                active.cancel.cancel();
                info!(%run_id, instance = active.instance, "cancellation requested");
                true
            }
            None => {
                debug!(%run_id, "cancel requested for a run with no active execution");
                false
            }
        }
    }

    pub fn is_running(&self, run_id: &RunId) -> bool {
        self.inner.active.lock().contains_key(run_id)
    }

    pub fn active_runs(&self) -> Vec<RunId> {
        self.inner.active.lock().keys().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Cancel every registered run and wait up to `grace` for each unit to
    /// wind down.
    pub async fn shutdown(&self, grace: Duration) {
        let drained: Vec<(RunId, ActiveRun)> = self.inner.active.lock().drain().collect();
        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "cancelling active runs for shutdown");

        for (_, active) in &drained {
            active.cancel.cancel();
        }

        for (run_id, active) in drained {
            let Some(handle) = active.handle else {
                continue;
            };
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!(%run_id, "run did not stop within the shutdown grace period");
            }
        }
    }
}
