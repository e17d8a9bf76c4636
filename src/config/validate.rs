// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{RawConfigFile, ServiceConfig};
use crate::errors::{Result, TestdriveError};

impl TryFrom<RawConfigFile> for ServiceConfig {
    type Error = crate::errors::TestdriveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ServiceConfig::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_server(cfg)?;
    validate_executor(cfg)?;
    validate_stream(cfg)?;
    validate_experiments(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> TestdriveError {
    TestdriveError::ConfigError(msg.into())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.host.trim().is_empty() {
        return Err(config_error("[server].host must not be empty"));
    }
    if cfg.server.port == 0 {
        return Err(config_error("[server].port must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.max_concurrent_runs == 0 {
        return Err(config_error(
            "[executor].max_concurrent_runs must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_stream(cfg: &RawConfigFile) -> Result<()> {
    let stream = &cfg.stream;

    if stream.poll_interval_ms == 0 {
        return Err(config_error("[stream].poll_interval_ms must be >= 1 (got 0)"));
    }
    if stream.error_backoff_ms == 0 {
        return Err(config_error("[stream].error_backoff_ms must be >= 1 (got 0)"));
    }
    if stream.max_errors == 0 {
        return Err(config_error("[stream].max_errors must be >= 1 (got 0)"));
    }
    if stream.keep_alive_secs == 0 {
        return Err(config_error("[stream].keep_alive_secs must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_experiments(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for exp in &cfg.experiments {
        if exp.id.trim().is_empty() {
            return Err(config_error(format!(
                "experiment '{}' has an empty id",
                exp.name
            )));
        }
        if !seen.insert(exp.id.as_str()) {
            return Err(config_error(format!(
                "experiment id '{}' is defined more than once",
                exp.id
            )));
        }
    }
    Ok(())
}
