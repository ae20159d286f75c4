// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sitedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitedag",
    version,
    about = "Build, watch and deploy a static site from a task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run together with its prerequisites.
    #[arg(value_name = "TASK", default_value = "default")]
    pub task: String,

    /// Path to the manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "Sitedag.toml")]
    pub config: String,

    /// After the initial run, keep watching and re-run subscribed tasks.
    #[arg(long)]
    pub watch: bool,

    /// Resolve and print the plan without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEDAG_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
