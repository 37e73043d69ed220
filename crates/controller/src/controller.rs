//! The queue-driven controller.
//!
//! A controller owns one rate-limited queue of [`QueueKey`]s and a pool of
//! workers draining it. Each dequeued key is handed to the sync handler;
//! failures are retried with per-key backoff and, when configured, surfaced
//! as a `<name>Degraded` operator condition.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cron::Schedule;
use factory_core::{Error, ErrorHandler, Result, ResultExt, handle_crash};
use factory_workqueue::RateLimitingQueue;
use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{InformerSynced, wait_for_named_cache_sync};
use crate::error::{SyncError, SyncResult};
use crate::handler::{PostStartHook, SyncHandler};
use crate::status::{
    ConditionStatus, OperatorClient, OperatorCondition, update_condition_fn, update_status,
};
use crate::trigger::{run_periodic_resync, spawn_scheduled_resync};
use crate::types::{QueueKey, SyncContext};

/// Condition reason set while sync is failing.
pub const REASON_SYNC_ERROR: &str = "SyncError";
/// Condition reason set once sync succeeds again.
pub const REASON_AS_EXPECTED: &str = "AsExpected";

/// A named, runnable reconciliation controller.
#[async_trait]
pub trait Controller: Send + Sync {
    /// The controller name, used in logs and condition types.
    fn name(&self) -> &str;

    /// Run the sync handler once, outside the worker loop.
    async fn sync(&self, ctx: &CancellationToken, sync_ctx: &SyncContext) -> SyncResult;

    /// Run until `ctx` is cancelled, then drain and return.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheSyncTimeout`] when caches never sync.
    async fn run(&self, ctx: CancellationToken, workers: usize) -> Result<()>;
}

pub(crate) struct ControllerParts {
    pub(crate) name: String,
    pub(crate) caches_to_sync: Vec<InformerSynced>,
    pub(crate) sync: Arc<dyn SyncHandler>,
    pub(crate) sync_context: SyncContext,
    pub(crate) sync_degraded_client: Option<Arc<dyn OperatorClient>>,
    pub(crate) resync_every: Duration,
    pub(crate) resync_schedules: Vec<Schedule>,
    pub(crate) post_start_hooks: Vec<Arc<dyn PostStartHook>>,
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
}

/// The stock [`Controller`]. Built with [`ControllerBuilder`](crate::ControllerBuilder).
///
/// Cheap to clone; clones share the queue and configuration.
#[derive(Clone)]
pub struct BaseController {
    inner: Arc<ControllerParts>,
}

impl std::fmt::Debug for BaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseController")
            .field("name", &self.inner.name)
            .field("resync_every", &self.inner.resync_every)
            .field("resync_schedules", &self.inner.resync_schedules.len())
            .field("post_start_hooks", &self.inner.post_start_hooks.len())
            .field("reports_degraded", &self.inner.sync_degraded_client.is_some())
            .finish_non_exhaustive()
    }
}

impl BaseController {
    pub(crate) fn from_parts(parts: ControllerParts) -> Self {
        Self {
            inner: Arc::new(parts),
        }
    }

    /// The shared sync context. Producers enqueue through it.
    #[must_use]
    pub fn sync_context(&self) -> &SyncContext {
        &self.inner.sync_context
    }

    /// The controller queue.
    #[must_use]
    pub fn queue(&self) -> &RateLimitingQueue<QueueKey> {
        self.inner.sync_context.queue()
    }

    /// Wait for caches, start workers, triggers and hooks, and block until
    /// `ctx` is cancelled.
    ///
    /// On cancellation the queue is shut down, workers finish their current
    /// item and exit, and this returns once hooks and workers have all
    /// terminated. Pending rate-limited re-adds are dropped with the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheSyncTimeout`] when `ctx` is cancelled before the
    /// caches sync. The error is also reported to the error handler.
    pub async fn run(&self, ctx: CancellationToken, workers: usize) -> Result<()> {
        let name = self.inner.name.as_str();

        if !wait_for_named_cache_sync(name, &ctx, &self.inner.caches_to_sync).await {
            let err = Error::cache_sync_timeout(name);
            self.inner.error_handler.handle_error(&err);
            return Err(err);
        }

        // Workers outlive ctx so they can drain after the queue shuts down
        let queue_token = CancellationToken::new();
        let mut worker_tasks = JoinSet::new();

        if workers == 0 {
            warn!(controller = name, "Starting controller with no workers");
        }
        for worker in 1..=workers {
            let controller = self.clone();
            let token = queue_token.clone();
            worker_tasks.spawn(async move {
                debug!(controller = %controller.inner.name, worker, "Starting worker");
                controller.run_worker(token).await;
            });
        }

        let cron_token = CancellationToken::new();
        let stop_cron = cron_token.clone().drop_guard();
        let cron_tasks: Vec<_> = self
            .inner
            .resync_schedules
            .iter()
            .map(|schedule| {
                spawn_scheduled_resync(name, self.queue().clone(), schedule.clone(), cron_token.clone())
            })
            .collect();

        if !self.inner.resync_every.is_zero() {
            worker_tasks.spawn(run_periodic_resync(
                name.to_string(),
                self.queue().clone(),
                self.inner.resync_every,
                ctx.clone(),
            ));
        }

        let hook_tasks = self.spawn_post_start_hooks(&ctx);

        info!(controller = name, workers, "Controller started");
        ctx.cancelled().await;
        info!(controller = name, "Shutting down controller");

        self.queue().shut_down();
        queue_token.cancel();

        if let Some(hook_tasks) = hook_tasks {
            self.join_all(hook_tasks).await;
            info!("All {name} post start hooks have been terminated");
        }
        drop(stop_cron);
        for task in cron_tasks {
            if let Err(err) = task.await {
                self.report_join_error(err);
            }
        }
        self.join_all(worker_tasks).await;
        info!("All {name} workers have been terminated");
        self.queue().wait_for_delayed().await;

        Ok(())
    }

    fn spawn_post_start_hooks(&self, ctx: &CancellationToken) -> Option<JoinSet<()>> {
        if self.inner.post_start_hooks.is_empty() {
            return None;
        }

        let mut tasks = JoinSet::new();
        for hook in &self.inner.post_start_hooks {
            let hook = Arc::clone(hook);
            let ctx = ctx.clone();
            let sync_ctx = self.inner.sync_context.clone();
            let controller = self.inner.name.clone();
            tasks.spawn(async move {
                let _ = hook.run(ctx, sync_ctx).await.inspect_error(|e| {
                    warn!(controller = %controller, error = %e, "Post start hook failed");
                });
            });
        }
        Some(tasks)
    }

    async fn join_all(&self, mut tasks: JoinSet<()>) {
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                self.report_join_error(err);
            }
        }
    }

    /// Report a task that did not finish normally. Returns whether it panicked.
    fn report_join_error(&self, err: JoinError) -> bool {
        if err.is_panic() {
            handle_crash(&self.inner.name, err.into_panic().as_ref());
            true
        } else {
            debug!(controller = %self.inner.name, error = %err, "Task was cancelled");
            false
        }
    }

    /// Drain the queue until it shuts down or `queue_token` is cancelled.
    ///
    /// A panic in the sync handler ends this worker after being logged; the
    /// in-flight key is still marked done.
    async fn run_worker(&self, queue_token: CancellationToken) {
        let worker = AssertUnwindSafe(async {
            while !queue_token.is_cancelled() {
                if !self.process_next_work_item(&queue_token).await {
                    break;
                }
            }
        });

        if let Err(payload) = worker.catch_unwind().await {
            handle_crash(&self.inner.name, payload.as_ref());
        }
    }

    /// Process one key. Returns `false` once the queue has shut down.
    pub(crate) async fn process_next_work_item(&self, ctx: &CancellationToken) -> bool {
        let queue = self.queue();
        let Some(in_flight) = queue.acquire().await else {
            return false;
        };
        let key = in_flight.item().clone();

        if key.is_blank() {
            self.inner
                .error_handler
                .handle_error(&Error::malformed_queue_key(&self.inner.name, key.as_str()));
            return true;
        }

        let sync_ctx = self.inner.sync_context.with_key(key.clone());
        match self.reconcile(ctx, &sync_ctx).await {
            Ok(()) => queue.forget(&key),
            Err(SyncError::SyntheticRequeue) => {
                debug!(controller = %self.inner.name, key = %key, "Requeueing on request");
                queue.add_rate_limited(key);
            }
            Err(err) => {
                self.inner.error_handler.handle_error(&Error::sync_failed(
                    &self.inner.name,
                    key.as_str(),
                    err.to_string(),
                ));
                queue.add_rate_limited(key);
            }
        }
        true
    }

    /// Run the sync handler and mirror its outcome into the degraded condition.
    async fn reconcile(&self, ctx: &CancellationToken, sync_ctx: &SyncContext) -> SyncResult {
        let result = self.inner.sync.sync(ctx, sync_ctx).await;
        let Some(client) = &self.inner.sync_degraded_client else {
            return result;
        };
        let condition_type = format!("{}Degraded", self.inner.name);

        match result {
            Err(err) => {
                let degraded = OperatorCondition::new(condition_type, ConditionStatus::True)
                    .with_reason(REASON_SYNC_ERROR)
                    .with_message(err.to_string());
                let _ = update_status(client.as_ref(), &[update_condition_fn(degraded)])
                    .await
                    .ok_or_warn("Updating degraded condition failed");
                Err(err)
            }
            Ok(()) => {
                let healthy = OperatorCondition::new(condition_type, ConditionStatus::False)
                    .with_reason(REASON_AS_EXPECTED);
                update_status(client.as_ref(), &[update_condition_fn(healthy)]).await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Controller for BaseController {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn sync(&self, ctx: &CancellationToken, sync_ctx: &SyncContext) -> SyncResult {
        self.inner.sync.sync(ctx, sync_ctx).await
    }

    async fn run(&self, ctx: CancellationToken, workers: usize) -> Result<()> {
        Self::run(self, ctx, workers).await
    }
}
