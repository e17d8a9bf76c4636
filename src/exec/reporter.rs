// src/exec/reporter.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::publish::StatusPublisher;
use crate::store::RunStore;
use crate::types::{RunId, RunStatus};

/// Progress capability bound to a single run.
///
/// Each report is written to the [`RunStore`] first and then published, so
/// an observer woken by the publisher always finds the new state in the
/// store. If the store rejects an update (unknown or already-terminal run)
/// the reporter goes quiet: later reports are dropped without touching the
/// store.
///
/// A `completed` report is held back. Only the runner can complete a run,
/// together with its result, so the step text is kept until then and any
/// report after it is dropped.
#[derive(Clone)]
pub struct Reporter {
    run_id: RunId,
    store: RunStore,
    publisher: StatusPublisher,
    stopped: Arc<AtomicBool>,
    completion: Arc<Mutex<Option<String>>>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("run_id", &self.run_id)
            .field("stopped", &self.is_stopped())
            .field("completion", &*self.completion.lock())
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(run_id: RunId, store: RunStore, publisher: StatusPublisher) -> Self {
        Self {
            run_id,
            store,
            publisher,
            stopped: Arc::new(AtomicBool::new(false)),
            completion: Arc::new(Mutex::new(None)),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns `true` if the update was accepted.
    pub fn report(&self, status: RunStatus, progress: f64, step: impl Into<String>) -> bool {
        if self.is_stopped() {
            return false;
        }

        let mut completion = self.completion.lock();
        if status == RunStatus::Completed {
            *completion = Some(step.into());
            return true;
        }
        if completion.is_some() {
            debug!(run_id = %self.run_id, %status, "report after completion dropped");
            return false;
        }

        // Held across write and notify.
        match self.store.update_status(&self.run_id, status, progress, step) {
            Ok(run) => {
                self.publisher.notify(self.run_id, run.snapshot());
                true
            }
            Err(err) => {
                debug!(
                    run_id = %self.run_id,
                    %status,
                    error = %err,
                    "status update rejected; reporter stopped"
                );
                self.stopped.store(true, Ordering::Release);
                false
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Step text of the last `completed` report, if the job sent one.
    ///
    /// Taking it clears the hold, so the runner can still report a failure.
    pub(crate) fn take_completion_step(&self) -> Option<String> {
        self.completion.lock().take()
    }
}
