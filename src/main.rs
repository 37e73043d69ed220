//! # Factory - controller host
//!
//! Runs the configured reconciliation controllers until interrupted.
//!
//! ## Startup Sequence
//!
//! 1. **Tracing** - `RUST_LOG` filter, `info` by default
//! 2. **Configuration** - TOML file from `--config`, or a single example controller
//! 3. **Controllers** - one task per controller, each waiting for its caches first
//!
//! ## Shutdown
//!
//! Ctrl+C cancels the shared context. Every controller shuts its queue down,
//! lets in-flight keys finish and waits for its hooks and workers before the
//! process exits.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use factory::cli::Cli;
use factory::config::FactoryConfig;
use factory::run_controllers;
use factory_controller::InMemoryOperatorClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        controllers = config.controllers.len(),
        "Factory starting..."
    );

    let ctx = CancellationToken::new();
    let status = Arc::new(InMemoryOperatorClient::new());
    let mut runner = {
        let ctx = ctx.clone();
        tokio::spawn(async move { run_controllers(&config, status, ctx).await })
    };

    let outcome = tokio::select! {
        joined = &mut runner => joined,
        () = wait_for_shutdown() => {
            ctx.cancel();
            runner.await
        }
    };
    outcome.context("Controller runner panicked")??;

    info!(
        uptime_secs = start_time.elapsed().as_secs(),
        "Factory stopped gracefully"
    );
    Ok(())
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<FactoryConfig> {
    let config = match &cli.config {
        Some(path) => FactoryConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            info!("No config given, running the example controller");
            FactoryConfig::default()
        }
    };

    Ok(match cli.workers {
        Some(workers) if workers > 0 => config.with_workers(workers),
        Some(_) => anyhow::bail!("--workers must be at least 1"),
        None => config,
    })
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
