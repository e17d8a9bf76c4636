// src/types.rs

//! Small value types shared by the store, the publisher and the executor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a single run.
///
/// Backed by a random v4 UUID and serialized as its hyphenated string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for RunId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a run.
///
/// ```text
/// pending -> initialising -> running -> (analysing) -> completed
///     \____________\_____________\___________\______-> failed
/// ```
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "initialising")]
    Initializing,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "analysing")]
    Analyzing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Wire representation, identical to the serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Initializing => "initialising",
            RunStatus::Running => "running",
            RunStatus::Analyzing => "analysing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "initialising" => Ok(RunStatus::Initializing),
            "running" => Ok(RunStatus::Running),
            "analysing" => Ok(RunStatus::Analyzing),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("invalid run status: {other}")),
        }
    }
}

/// The observable state of a run at one instant.
///
/// Two snapshots are the same frame (see [`Snapshot::same_frame`]) when all
/// three fields match; subscriptions use this to coalesce duplicate updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub status: RunStatus,
    pub progress: f64,
    pub current_step: Option<String>,
}

impl Snapshot {
    pub fn new(status: RunStatus, progress: f64, current_step: Option<String>) -> Self {
        Self {
            status,
            progress,
            current_step,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Equality for coalescing. Progress is compared bit for bit, so a `NaN`
    /// report matches itself.
    pub fn same_frame(&self, other: &Snapshot) -> bool {
        self.status == other.status
            && self.progress.to_bits() == other.progress.to_bits()
            && self.current_step == other.current_step
    }
}
