//! Waiting for informer caches before workers start.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reports whether one informer cache has completed its initial list.
pub type InformerSynced = Arc<dyn Fn() -> bool + Send + Sync>;

/// How often cache predicates are polled.
pub const CACHE_SYNC_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Wrap a predicate as an [`InformerSynced`].
pub fn informer_synced(f: impl Fn() -> bool + Send + Sync + 'static) -> InformerSynced {
    Arc::new(f)
}

/// Poll `caches` until all report synced or `ctx` is cancelled.
///
/// Predicates are checked before the first wait, so already-synced caches
/// succeed even under a cancelled context. Returns whether all synced.
pub async fn wait_for_cache_sync(ctx: &CancellationToken, caches: &[InformerSynced]) -> bool {
    loop {
        if caches.iter().all(|synced| synced()) {
            return true;
        }
        tokio::select! {
            () = ctx.cancelled() => return false,
            () = tokio::time::sleep(CACHE_SYNC_POLL_PERIOD) => {}
        }
    }
}

/// [`wait_for_cache_sync`] with start and outcome logged under `controller`.
pub async fn wait_for_named_cache_sync(
    controller: &str,
    ctx: &CancellationToken,
    caches: &[InformerSynced],
) -> bool {
    info!(controller, "Waiting for caches to sync");

    if !wait_for_cache_sync(ctx, caches).await {
        error!(controller, "Unable to sync caches");
        return false;
    }

    info!(controller, "Caches are synced");
    true
}
