use std::sync::atomic::{AtomicUsize, Ordering};

use testdrive::errors::{Result, TestdriveError};
use testdrive::store::{Run, RunReader, RunStore};
use testdrive::types::RunId;

/// A [`RunReader`] over a real store that fails a window of reads.
///
/// Reads are numbered from 0 across all run ids; reads numbered in
/// `fail_from..fail_until` return an error.
#[derive(Debug)]
pub struct FlakyReader {
    store: RunStore,
    reads: AtomicUsize,
    fail_from: usize,
    fail_until: usize,
}

impl FlakyReader {
    /// Healthy for the first `healthy` reads, broken afterwards.
    pub fn failing_after(store: RunStore, healthy: usize) -> Self {
        Self::failing_between(store, healthy, usize::MAX)
    }

    pub fn failing_between(store: RunStore, fail_from: usize, fail_until: usize) -> Self {
        Self {
            store,
            reads: AtomicUsize::new(0),
            fail_from,
            fail_until,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RunReader for FlakyReader {
    fn read(&self, run_id: &RunId) -> Result<Run> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if (self.fail_from..self.fail_until).contains(&n) {
            return Err(TestdriveError::Other(anyhow::anyhow!(
                "store unavailable (read #{n})"
            )));
        }
        self.store.get(run_id)
    }
}
