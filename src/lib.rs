// src/lib.rs

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod publish;
pub mod store;
pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::api::AppState;
use crate::cli::CliArgs;
use crate::config::{ServiceConfig, default_config_path, load_and_validate, load_or_default};

pub use crate::errors::TestdriveError;
pub use crate::exec::{ExperimentJob, JobContext, JobError, TaskExecutor};
pub use crate::publish::{StatusPublisher, StreamSettings};
pub use crate::store::{ExperimentResult, Run, RunStore};
pub use crate::types::{RunId, RunStatus, Snapshot};

/// How long in-flight runs get to wind down after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - run store, status publisher and executor
/// - the HTTP router
/// - Ctrl-C handling: active runs are cancelled first so open status
///   streams can finish, then the server drains.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => load_or_default(default_config_path())?,
    };

    if let Some(host) = args.host.clone() {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let state = AppState::with_simulation(&cfg);
    let executor = state.executor.clone();
    let app = api::router(state, &cfg.server.cors_origins);

    let addr = cfg.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, experiments = cfg.catalog.len(), "testdrive listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(executor))
        .await
        .context("serving HTTP")?;

    info!("testdrive stopped");
    Ok(())
}

async fn shutdown_signal(executor: TaskExecutor) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }

    info!("shutdown requested");
    executor.shutdown(SHUTDOWN_GRACE).await;
}

/// Simple dry-run output: print settings and the experiment catalog.
fn print_dry_run(cfg: &ServiceConfig) {
    println!("testdrive dry-run");
    println!("  server.bind = {}", cfg.bind_address());
    println!("  server.cors_origins = {:?}", cfg.server.cors_origins);
    println!(
        "  executor.max_concurrent_runs = {}",
        cfg.executor.max_concurrent_runs
    );
    println!("  executor.run_timeout_secs = {}", cfg.executor.run_timeout_secs);
    println!(
        "  stream = poll {}ms, backoff {}ms, max_errors {}",
        cfg.stream.poll_interval_ms, cfg.stream.error_backoff_ms, cfg.stream.max_errors
    );
    println!("  simulation.phase_delay_ms = {}", cfg.simulation.phase_delay_ms);
    println!();

    println!("experiments ({}):", cfg.catalog.len());
    for exp in cfg.catalog.list() {
        println!("  - {} ({})", exp.id, exp.name);
        println!("      category: {}", exp.category);
        if !exp.tags.is_empty() {
            println!("      tags: {:?}", exp.tags);
        }
        for (key, value) in &exp.config.parameters {
            println!("      {key} = {value}");
        }
    }

    debug!("dry-run complete (server not started)");
}
