//! Jobs whose pace is driven by the test.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use testdrive::exec::{ExperimentJob, JobContext, JobError, JobFuture};
use testdrive::store::ExperimentResult;
use testdrive::types::RunStatus;

/// Hands out permits to a job waiting at a gate.
///
/// Permits accumulate, so releasing before the job arrives is fine.
#[derive(Debug, Clone)]
pub struct JobGate {
    permits: Arc<Semaphore>,
}

impl JobGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let one waiting step through.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

impl Default for JobGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum Step {
    Report {
        status: RunStatus,
        progress: f64,
        step: String,
    },
    Wait {
        honour_cancel: bool,
    },
}

#[derive(Debug, Clone)]
enum Finish {
    Succeed,
    Fail(String),
}

/// A job that replays a fixed list of reports, pausing at gates.
///
/// ```ignore
/// let job = ScriptedJob::new()
///     .report(RunStatus::Running, 10.0, "Loading data")
///     .wait()
///     .report(RunStatus::Completed, 100.0, "Done");
/// let gate = job.gate();
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedJob {
    steps: Vec<Step>,
    finish: Finish,
    gate: JobGate,
    invocations: Arc<AtomicUsize>,
}

impl ScriptedJob {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            finish: Finish::Succeed,
            gate: JobGate::new(),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn report(mut self, status: RunStatus, progress: f64, step: &str) -> Self {
        self.steps.push(Step::Report {
            status,
            progress,
            step: step.to_string(),
        });
        self
    }

    /// Block until the gate is released; returns `Cancelled` if the run is
    /// cancelled first.
    pub fn wait(mut self) -> Self {
        self.steps.push(Step::Wait { honour_cancel: true });
        self
    }

    /// Block until the gate is released, deaf to cancellation.
    pub fn wait_ignoring_cancel(mut self) -> Self {
        self.steps.push(Step::Wait {
            honour_cancel: false,
        });
        self
    }

    /// After the script, report `failed` and return an error.
    pub fn fail(mut self, message: &str) -> Self {
        self.finish = Finish::Fail(message.to_string());
        self
    }

    pub fn gate(&self) -> JobGate {
        self.gate.clone()
    }

    /// How many runs this job has been started for.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn into_job(self) -> Arc<dyn ExperimentJob> {
        Arc::new(self)
    }
}

impl Default for ScriptedJob {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentJob for ScriptedJob {
    fn run(&self, ctx: JobContext) -> JobFuture {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let steps = self.steps.clone();
        let finish = self.finish.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            for step in steps {
                match step {
                    Step::Report {
                        status,
                        progress,
                        step,
                    } => {
                        ctx.report(status, progress, step);
                    }
                    Step::Wait { honour_cancel: true } => {
                        tokio::select! {
                            biased;
                            _ = ctx.cancel.cancelled() => return Err(JobError::Cancelled),
                            _ = gate.pass() => {}
                        }
                    }
                    Step::Wait {
                        honour_cancel: false,
                    } => gate.pass().await,
                }
            }

            match finish {
                Finish::Succeed => Ok(scripted_result(&ctx)),
                Finish::Fail(message) => {
                    ctx.report(RunStatus::Failed, 0.0, format!("Error: {message}"));
                    Err(JobError::Failed(message))
                }
            }
        })
    }
}

fn scripted_result(ctx: &JobContext) -> ExperimentResult {
    let mut result = ctx.empty_result();
    result.summary = "scripted run".to_string();
    result.metrics.insert("score".to_string(), 1.0);
    result
}

/// A job that panics as soon as it is polled.
pub async fn panicking_job(_ctx: JobContext) -> Result<ExperimentResult, JobError> {
    panic!("scripted panic")
}
