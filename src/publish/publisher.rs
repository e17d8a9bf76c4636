// src/publish/publisher.rs

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::errors::Result;
use crate::store::RunReader;
use crate::types::{RunId, Snapshot};

use super::StreamSettings;
use super::subscription::Subscription;

/// Fan-out of run state changes to any number of observers.
///
/// Only the most recent snapshot per run is retained: a newer `notify`
/// replaces an older one whether or not anybody saw it. Once a terminal
/// snapshot is published the run's channel is retired; subscribers still
/// attached fall back to reading the store directly.
#[derive(Clone)]
pub struct StatusPublisher {
    reader: Arc<dyn RunReader>,
    channels: Arc<DashMap<RunId, watch::Sender<Snapshot>>>,
    settings: StreamSettings,
}

impl fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("live_channels", &self.channels.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl StatusPublisher {
    pub fn new(reader: Arc<dyn RunReader>, settings: StreamSettings) -> Self {
        Self {
            reader,
            channels: Arc::new(DashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> StreamSettings {
        self.settings
    }

    /// Record `snapshot` as the latest state of `run_id` and wake its waiters.
    ///
    /// A run without subscribers has no channel and the call is a no-op; the
    /// store is the source of truth for whoever subscribes later.
    pub fn notify(&self, run_id: RunId, snapshot: Snapshot) {
        let terminal = snapshot.is_terminal();

        match self.channels.entry(run_id) {
            Entry::Occupied(slot) => {
                if terminal {
                    // Waiters see the final value, then the closed channel.
                    slot.remove().send_replace(snapshot);
                    debug!(%run_id, "terminal snapshot published; channel retired");
                } else {
                    slot.get().send_replace(snapshot);
                    trace!(%run_id, "snapshot published");
                }
            }
            Entry::Vacant(_) => {
                // Nobody is watching, or the channel is already retired.
                // Channels are only opened by `subscribe`.
                trace!(%run_id, terminal, "no channel; snapshot dropped");
            }
        }
    }

    /// Attach a new observer to `run_id`.
    ///
    /// Fails with `RunNotFound` when the run is unknown. The returned
    /// subscription starts from the current state; no history is replayed.
    pub fn subscribe(&self, run_id: RunId) -> Result<Subscription> {
        let run = self.reader.read(&run_id)?;

        let updates = if run.is_terminal() {
            None
        } else {
            let rx = self
                .channels
                .entry(run_id)
                .or_insert_with(|| watch::channel(run.snapshot()).0)
                .subscribe();

            // A terminal notify may have slipped in between the read and the
            // insert; don't leave a channel nobody will ever retire.
            if self.reader.read(&run_id).map(|r| r.is_terminal()).unwrap_or(true) {
                self.channels.remove(&run_id);
            }
            Some(rx)
        };

        debug!(%run_id, status = %run.status, "observer subscribed");

        Ok(Subscription::new(
            run_id,
            Arc::clone(&self.reader),
            updates,
            self.settings,
        ))
    }

    /// Number of runs that currently have a live channel.
    pub fn live_channels(&self) -> usize {
        self.channels.len()
    }
}
