// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `testdrive`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "testdrive",
    version,
    about = "Run experiments in the background and stream their progress over HTTP.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Testdrive.toml` in the current working directory is used
    /// when present, otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Address to bind, overriding `[server].host`.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on, overriding `[server].port`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TESTDRIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load + validate config, print settings and catalog, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
