//! Sync handlers and post-start hooks.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SyncResult;
use crate::types::SyncContext;

/// Reconciles whatever the current key names.
///
/// Invoked concurrently by every worker of a controller, but never twice at
/// once for the same key.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// Bring the world in line with `sync_ctx.queue_key()`.
    async fn sync(&self, ctx: &CancellationToken, sync_ctx: &SyncContext) -> SyncResult;
}

/// Closure-backed [`SyncHandler`]. See [`sync_fn`].
pub struct SyncFn<F>(F);

/// Wrap an async closure as a [`SyncHandler`].
pub const fn sync_fn<F, Fut>(f: F) -> SyncFn<F>
where
    F: Fn(CancellationToken, SyncContext) -> Fut + Send + Sync,
    Fut: Future<Output = SyncResult> + Send + 'static,
{
    SyncFn(f)
}

#[async_trait]
impl<F, Fut> SyncHandler for SyncFn<F>
where
    F: Fn(CancellationToken, SyncContext) -> Fut + Send + Sync,
    Fut: Future<Output = SyncResult> + Send + 'static,
{
    async fn sync(&self, ctx: &CancellationToken, sync_ctx: &SyncContext) -> SyncResult {
        (self.0)(ctx.clone(), sync_ctx.clone()).await
    }
}

/// A task started alongside the workers once caches are synced.
///
/// Hooks receive the controller context and are expected to return when it
/// is cancelled. Shutdown waits for every hook.
#[async_trait]
pub trait PostStartHook: Send + Sync {
    /// Run until done or until `ctx` is cancelled.
    async fn run(&self, ctx: CancellationToken, sync_ctx: SyncContext) -> anyhow::Result<()>;
}

/// Closure-backed [`PostStartHook`]. See [`hook_fn`].
pub struct HookFn<F>(F);

/// Wrap an async closure as a [`PostStartHook`].
pub const fn hook_fn<F, Fut>(f: F) -> HookFn<F>
where
    F: Fn(CancellationToken, SyncContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HookFn(f)
}

#[async_trait]
impl<F, Fut> PostStartHook for HookFn<F>
where
    F: Fn(CancellationToken, SyncContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: CancellationToken, sync_ctx: SyncContext) -> anyhow::Result<()> {
        (self.0)(ctx, sync_ctx).await
    }
}
