// src/exec/mod.rs

//! Run execution layer.
//!
//! - [`job`] defines the `ExperimentJob` contract and the context a job runs
//!   with (reporter + cancellation token).
//! - [`reporter`] is the narrow progress capability bound to one run.
//! - [`executor`] owns the run id -> running unit registry and enforces at
//!   most one unit per run.
//! - [`task_runner`] is the body of each unit: run the job, then record the
//!   result or the failure.
//! - [`simulation`] is the mock computation the service runs by default.

pub mod executor;
pub mod job;
pub mod reporter;
pub mod simulation;
pub mod task_runner;

pub use executor::{ExecutorLimits, TaskExecutor};
pub use job::{ExperimentJob, JobContext, JobError, JobFuture};
pub use reporter::Reporter;
pub use simulation::SimulationJob;
