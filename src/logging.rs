// src/logging.rs

//! Logging setup for `testdrive` using `tracing` + `tracing-subscriber`.
//!
//! The service logs under two targets: its own (`testdrive`) and the HTTP
//! request spans from `tower_http`'s `TraceLayer`. Other crates stay silent
//! unless `TESTDRIVE_LOG` names them.
//!
//! Filter resolution:
//! 1. `--log-level` CLI flag, applied to both targets;
//! 2. `TESTDRIVE_LOG`, either a bare level ("debug") or a full `EnvFilter`
//!    directive string ("testdrive::publish=trace,tower_http=warn");
//! 3. `info` for both targets.
//!
//! Logs go to STDERR.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no CLI level is given.
pub const LOG_ENV: &str = "TESTDRIVE_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let spec = filter_spec(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&spec)
        .map_err(|e| anyhow::anyhow!("invalid log filter {spec:?}: {e}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

/// The `EnvFilter` directive string for a CLI level and an optional
/// `TESTDRIVE_LOG` value. An unusable env value falls back to the default.
pub fn filter_spec(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return filter_directives(level_from_log_level(lvl));
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => match parse_level_str(value) {
            Some(level) => filter_directives(level),
            None if EnvFilter::try_new(value).is_ok() => value.to_string(),
            None => filter_directives(Level::INFO),
        },
        None => filter_directives(Level::INFO),
    }
}

/// Directives enabling `level` for this crate and the HTTP trace layer,
/// with `tower_http` capped at `debug`.
pub fn filter_directives(level: Level) -> String {
    let http = level.min(Level::DEBUG);
    format!(
        "testdrive={},tower_http={}",
        level.as_str().to_ascii_lowercase(),
        http.as_str().to_ascii_lowercase()
    )
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
