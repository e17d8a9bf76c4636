// src/catalog/mod.rs

//! Experiment definitions that runs are started from.
//!
//! The catalog is read-only once the service is up. It comes either from
//! `[[experiment]]` tables in the config file or, when there are none, from
//! the built-in demo set in [`builtin`].

pub mod builtin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, TestdriveError};

/// Parameters and metadata handed to a job when a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Rough duration hint in seconds, shown to clients only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
}

impl ExperimentConfig {
    /// Copy of this config with `overrides` applied via [`merge_parameters`].
    pub fn with_overrides(&self, overrides: &Map<String, Value>) -> Self {
        Self {
            parameters: merge_parameters(&self.parameters, overrides),
            ..self.clone()
        }
    }
}

/// Static description of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub config: ExperimentConfig,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Apply client overrides to a base parameter set.
///
/// Only keys that already exist in `base` are replaced; anything else in
/// `overrides` is dropped.
pub fn merge_parameters(
    base: &Map<String, Value>,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        if let Some(slot) = merged.get_mut(key) {
            *slot = value.clone();
        }
    }
    merged
}

/// Ordered, id-addressable set of experiment definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    experiments: Vec<ExperimentDefinition>,
}

impl Catalog {
    pub fn new(experiments: Vec<ExperimentDefinition>) -> Self {
        Self { experiments }
    }

    /// The demo experiments shipped with the service.
    pub fn builtin() -> Self {
        Self::new(builtin::experiments())
    }

    pub fn get(&self, id: &str) -> Option<&ExperimentDefinition> {
        self.experiments.iter().find(|exp| exp.id == id)
    }

    /// Like [`Catalog::get`], but an unknown id is an error.
    pub fn require(&self, id: &str) -> Result<&ExperimentDefinition> {
        self.get(id)
            .ok_or_else(|| TestdriveError::ExperimentNotFound(id.to_string()))
    }

    pub fn list(&self) -> &[ExperimentDefinition] {
        &self.experiments
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}
