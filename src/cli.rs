//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

/// Factory - queue-driven reconciliation controllers
#[derive(Parser, Debug)]
#[command(name = "factory")]
#[command(version)]
#[command(about = "Run reconciliation controllers until interrupted")]
#[command(
    long_about = "Runs one queue-driven controller per configured entry, resyncing on intervals and cron schedules, until Ctrl+C."
)]
pub struct Cli {
    /// Path to a TOML config file. A single example controller runs without one.
    #[arg(short, long, env = "FACTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the worker count of every controller
    #[arg(short, long, value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,
}
