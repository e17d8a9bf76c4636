// src/store/run.rs

//! Records kept by the [`RunStore`](super::RunStore).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{RunId, RunStatus, Snapshot};

/// One execution attempt of an experiment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub experiment_id: String,
    pub status: RunStatus,
    /// 0-100 by convention of the job; the store does not clamp it.
    pub progress: f64,
    pub current_step: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Set if and only if `status` is terminal.
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Headline metrics, filled in when a result is saved.
    pub results: Option<BTreeMap<String, f64>>,
}

impl Run {
    pub(crate) fn pending(run_id: RunId, experiment_id: &str) -> Self {
        Self {
            run_id,
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Pending,
            progress: 0.0,
            current_step: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            error_message: None,
            results: None,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.status, self.progress, self.current_step.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Output of a successful run. Associated 1:1 with its run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub run_id: RunId,
    pub experiment_id: String,
    pub summary: String,
    pub metrics: BTreeMap<String, f64>,
    pub visualizations: Vec<Value>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExperimentResult {
    /// A result with no content besides its ids; handy for jobs that only
    /// produce metrics.
    pub fn empty(run_id: RunId, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id,
            experiment_id: experiment_id.into(),
            summary: String::new(),
            metrics: BTreeMap::new(),
            visualizations: Vec::new(),
            recommendations: Vec::new(),
            metadata: Map::new(),
        }
    }
}
