//! Builds controllers from configuration and runs them together.

use std::sync::Arc;

use anyhow::{Context, Result};
use factory_controller::{
    BaseController, ControllerBuilder, InMemoryOperatorClient, OperatorClient, PostStartHook,
    SyncError, SyncContext, hook_fn, sync_fn,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ControllerConfig, FactoryConfig};

/// Build one controller.
///
/// The sync handler logs each key it reconciles. Seed keys are enqueued by a
/// post-start hook so they only flow once caches are synced.
///
/// # Errors
///
/// Fails when the entry does not produce a valid controller.
pub fn build_controller(
    config: &ControllerConfig,
    status: &Arc<InMemoryOperatorClient>,
) -> Result<BaseController> {
    let name = config.name.clone();
    let mut builder = ControllerBuilder::new()
        .with_sync(sync_fn(move |_ctx, sync_ctx: SyncContext| {
            let name = name.clone();
            async move {
                let key = sync_ctx.queue_key().map(ToString::to_string).unwrap_or_default();
                info!(controller = %name, key = %key, "Reconciled");
                Ok::<(), SyncError>(())
            }
        }))
        .resync_every(config.resync_every())
        .resync_schedule(config.resync_schedules.iter().cloned());

    if !config.seed_keys.is_empty() {
        builder = builder.with_post_start_hooks([seed_hook(config.seed_keys.clone())]);
    }
    if config.report_degraded {
        builder = builder
            .with_sync_degraded_on_error(Arc::clone(status) as Arc<dyn OperatorClient>);
    }

    builder
        .build(config.name.as_str())
        .with_context(|| format!("Failed to build controller '{}'", config.name))
}

fn seed_hook(keys: Vec<String>) -> Arc<dyn PostStartHook> {
    Arc::new(hook_fn(move |_ctx, sync_ctx: SyncContext| {
        let keys = keys.clone();
        async move {
            for key in keys {
                sync_ctx.enqueue(key);
            }
            Ok::<(), anyhow::Error>(())
        }
    }))
}

/// Run every configured controller until `ctx` is cancelled.
///
/// Controllers share `status`, so each one owns a `<name>Degraded`
/// condition on the same operator status.
///
/// # Errors
///
/// Fails if any controller cannot be built or fails to start.
pub async fn run_controllers(
    config: &FactoryConfig,
    status: Arc<InMemoryOperatorClient>,
    ctx: CancellationToken,
) -> Result<()> {
    let controllers = config
        .controllers
        .iter()
        .map(|entry| build_controller(entry, &status).map(|controller| (controller, entry.workers)))
        .collect::<Result<Vec<_>>>()?;

    let mut tasks = JoinSet::new();
    for (controller, workers) in controllers {
        let ctx = ctx.clone();
        tasks.spawn(async move { controller.run(ctx, workers).await });
    }
    info!(controllers = tasks.len(), "Controllers started");

    let mut failures = 0_usize;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("Controller task failed")? {
            Ok(()) => {}
            Err(err) => {
                warn!(error = %err, "Controller stopped with an error");
                failures = failures.saturating_add(1);
            }
        }
    }

    log_conditions(status.as_ref()).await;

    if failures > 0 {
        anyhow::bail!("{failures} controller(s) failed");
    }
    Ok(())
}

async fn log_conditions(status: &InMemoryOperatorClient) {
    for condition in status.status().await.conditions {
        info!(
            condition = %condition.condition_type,
            status = ?condition.status,
            reason = %condition.reason,
            message = %condition.message,
            "Final operator condition"
        );
    }
}
