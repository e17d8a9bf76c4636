// src/publish/subscription.rs

//! Per-observer state machine.
//!
//! ```text
//!            +-----------------------------+
//!            v                             |
//!  start -> Read --ok, non-terminal--> Wait (change | poll interval)
//!            |  \
//!            |   `--err--> Backoff --> Read      (budget left)
//!            |         `-> Done                  (budget exhausted)
//!            `--ok, terminal--> Finishing -> Done
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::store::{Run, RunReader};
use crate::types::{RunId, RunStatus, Snapshot};

use super::StreamSettings;

/// Payload of every [`SubscriptionEvent::Error`]. The underlying error is
/// only logged.
pub const READ_FAILED_MESSAGE: &str = "Failed to read run status";

/// What an observer receives.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The run changed since the last update on this subscription.
    Update(Run),
    /// Reading the run failed; the subscription retries after a backoff.
    Error(String),
    /// The run reached a terminal status. Always the last event.
    Complete(RunStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Read,
    Wait,
    Backoff,
    Finishing(RunStatus),
    Done,
}

/// A finite, lazily evaluated sequence of [`SubscriptionEvent`]s for one run.
pub struct Subscription {
    run_id: RunId,
    reader: Arc<dyn RunReader>,
    updates: Option<watch::Receiver<Snapshot>>,
    settings: StreamSettings,
    phase: Phase,
    last: Option<Snapshot>,
    consecutive_errors: u32,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase)
            .field("consecutive_errors", &self.consecutive_errors)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        run_id: RunId,
        reader: Arc<dyn RunReader>,
        updates: Option<watch::Receiver<Snapshot>>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            run_id,
            reader,
            updates,
            settings,
            phase: Phase::Read,
            last: None,
            consecutive_errors: 0,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Advance to the next event, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        loop {
            match self.phase {
                Phase::Done => return None,
                Phase::Finishing(status) => {
                    self.phase = Phase::Done;
                    return Some(SubscriptionEvent::Complete(status));
                }
                Phase::Wait => {
                    self.wait_for_change().await;
                    self.phase = Phase::Read;
                }
                Phase::Backoff => {
                    sleep(self.settings.error_backoff).await;
                    self.phase = Phase::Read;
                }
                Phase::Read => {
                    if let Some(event) = self.read_once() {
                        return Some(event);
                    }
                }
            }
        }
    }

    fn read_once(&mut self) -> Option<SubscriptionEvent> {
        match self.reader.read(&self.run_id) {
            Ok(run) => {
                self.consecutive_errors = 0;
                let snapshot = run.snapshot();

                self.phase = if snapshot.is_terminal() {
                    Phase::Finishing(snapshot.status)
                } else {
                    Phase::Wait
                };

                if self.last.as_ref().is_some_and(|last| last.same_frame(&snapshot)) {
                    return None;
                }
                self.last = Some(snapshot);
                Some(SubscriptionEvent::Update(run))
            }
            Err(err) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.settings.max_errors {
                    warn!(
                        run_id = %self.run_id,
                        errors = self.consecutive_errors,
                        error = %err,
                        "error budget exhausted; ending subscription"
                    );
                    self.phase = Phase::Done;
                } else {
                    debug!(
                        run_id = %self.run_id,
                        errors = self.consecutive_errors,
                        error = %err,
                        "read failed; backing off"
                    );
                    self.phase = Phase::Backoff;
                }
                Some(SubscriptionEvent::Error(READ_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Wait for a pushed change, but never longer than the poll interval.
    async fn wait_for_change(&mut self) {
        let poll = self.settings.poll_interval;

        let Some(rx) = self.updates.as_mut() else {
            sleep(poll).await;
            return;
        };

        let retired = tokio::select! {
            changed = rx.changed() => changed.is_err(),
            _ = sleep(poll) => false,
        };

        if retired {
            // Channel retired after a terminal publish; the store has the
            // final state, so the next read picks it up immediately.
            self.updates = None;
        }
    }
}
