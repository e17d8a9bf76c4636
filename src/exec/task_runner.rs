// src/exec/task_runner.rs

//! Body of the concurrency unit behind one run.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::publish::StatusPublisher;
use crate::store::{ExperimentResult, RunStore};
use crate::types::RunStatus;

use super::job::{ExperimentJob, JobContext, JobError};

/// Run a job to completion and write its outcome into the store.
///
/// - `Ok(result)`: the result is saved, which forces the run to `completed`.
///   The step comes from the job's last `completed` report, if any.
/// - `Err(..)`: the run is marked `failed` with progress 0 and the error
///   text as its step, then the error is logged.
///
/// Cleanup of executor bookkeeping is not done here; the caller owns that.
pub(crate) async fn run_job(
    job: Arc<dyn ExperimentJob>,
    ctx: JobContext,
    run_timeout: Option<Duration>,
    store: RunStore,
    publisher: StatusPublisher,
) {
    let run_id = ctx.run_id;
    let experiment_id = ctx.experiment_id.clone();
    let reporter = ctx.reporter.clone();

    info!(%run_id, %experiment_id, "starting experiment job");

    match supervise(job, ctx, run_timeout).await {
        Ok(mut result) => {
            // A result always belongs to the run that produced it.
            result.run_id = run_id;
            let final_step = reporter.take_completion_step();
            save_result(result, final_step, &store, &publisher);
        }
        Err(err) => {
            reporter.take_completion_step();
            reporter.report(RunStatus::Failed, 0.0, format!("Error: {err}"));
            match err {
                JobError::Cancelled => {
                    info!(%run_id, %experiment_id, "experiment job cancelled");
                }
                other => {
                    error!(
                        %run_id,
                        %experiment_id,
                        error = %other,
                        "experiment job failed"
                    );
                }
            }
        }
    }
}

/// Drive the job on its own task so a panic or a timeout can be told apart
/// from a regular error.
async fn supervise(
    job: Arc<dyn ExperimentJob>,
    ctx: JobContext,
    run_timeout: Option<Duration>,
) -> Result<ExperimentResult, JobError> {
    let cancel: CancellationToken = ctx.cancel.clone();
    let mut handle = tokio::spawn(job.run(ctx));

    let joined = match run_timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                handle.abort();
                return Err(JobError::TimedOut(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            Err(JobError::Failed("job panicked".to_string()))
        }
        Err(_) => Err(JobError::Cancelled),
    }
}

fn save_result(
    result: ExperimentResult,
    final_step: Option<String>,
    store: &RunStore,
    publisher: &StatusPublisher,
) {
    let run_id = result.run_id;
    match store.complete_with_result(result, final_step) {
        Ok(run) => {
            publisher.notify(run_id, run.snapshot());
            info!(%run_id, experiment_id = %run.experiment_id, "experiment completed");
        }
        Err(err) => {
            warn!(%run_id, error = %err, "result discarded");
        }
    }
}
