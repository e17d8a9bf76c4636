// src/exec/job.rs

//! The unit-of-work abstraction.
//!
//! A job receives a [`JobContext`] and produces an [`ExperimentResult`] or a
//! [`JobError`]. Contract:
//! - progress goes through `ctx.report(..)`, any number of times;
//! - on error, report `failed` before returning the error;
//! - check `ctx.cancel` at phase boundaries (see [`JobContext::checkpoint`]).
//!
//! The executor forces `completed` when a job returns `Ok`, so a job's own
//! final `completed` report is advisory: it is held by the reporter and only
//! lands, as the run's last step, together with the saved result.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::ExperimentConfig;
use crate::store::ExperimentResult;
use crate::types::{RunId, RunStatus};

use super::reporter::Reporter;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type JobFuture = Pin<Box<dyn Future<Output = Result<ExperimentResult, JobError>> + Send>>;

/// A long-running computation behind one run.
pub trait ExperimentJob: Send + Sync + 'static {
    fn run(&self, ctx: JobContext) -> JobFuture;
}

/// Plain async functions and closures are jobs too.
impl<F, Fut> ExperimentJob for F
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExperimentResult, JobError>> + Send + 'static,
{
    fn run(&self, ctx: JobContext) -> JobFuture {
        Box::pin(self(ctx))
    }
}

/// Everything a job gets to see of the outside world.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub experiment_id: String,
    pub run_id: RunId,
    pub config: ExperimentConfig,
    pub reporter: Reporter,
    pub cancel: CancellationToken,
}

impl JobContext {
    /// Shorthand for `self.reporter.report(..)`.
    pub fn report(&self, status: RunStatus, progress: f64, step: impl Into<String>) -> bool {
        self.reporter.report(status, progress, step)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for `duration`, or return `JobError::Cancelled` as soon as
    /// cancellation is requested.
    pub async fn checkpoint(&self, duration: Duration) -> Result<(), JobError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(JobError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// An empty result addressed to this run.
    pub fn empty_result(&self) -> ExperimentResult {
        ExperimentResult::empty(self.run_id, self.experiment_id.clone())
    }
}
