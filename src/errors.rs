// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::{RunId, RunStatus};

#[derive(Error, Debug)]
pub enum TestdriveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Results not found for run: {0}")]
    ResultNotFound(RunId),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// The run already reached `completed` or `failed`.
    #[error("Run {run_id} is already {status}; update rejected")]
    RunTerminal { run_id: RunId, status: RunStatus },

    #[error("Could not allocate a unique run id")]
    IdSpaceExhausted,

    /// A second concurrency unit was requested for a run that already has one.
    #[error("Run {0} already has an active execution")]
    StartupConflict(RunId),

    #[error("Executor at capacity ({0} concurrent runs)")]
    ExecutorAtCapacity(usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TestdriveError {
    /// Errors that mean "this run id is unknown to the ledger".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TestdriveError::RunNotFound(_) | TestdriveError::ResultNotFound(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TestdriveError>;
