//! Fluent construction of [`BaseController`]s.

use std::sync::Arc;
use std::time::Duration;

use factory_core::{Error, ErrorHandler, LogErrorHandler, Result};
use factory_workqueue::{RateLimiter, RateLimitingQueue, default_controller_rate_limiter};

use crate::cache::InformerSynced;
use crate::controller::{BaseController, ControllerParts};
use crate::handler::{PostStartHook, SyncHandler};
use crate::status::OperatorClient;
use crate::trigger::parse_schedule;
use crate::types::{QueueKey, SyncContext};

/// Builder for a [`BaseController`].
///
/// Only a sync handler is required. Everything else defaults to off: no
/// caches to wait for, no resync, no hooks, no degraded reporting, errors
/// logged, and the default controller rate limiter.
#[derive(Default)]
pub struct ControllerBuilder {
    caches_to_sync: Vec<InformerSynced>,
    sync: Option<Arc<dyn SyncHandler>>,
    sync_degraded_client: Option<Arc<dyn OperatorClient>>,
    resync_every: Duration,
    resync_schedules: Vec<String>,
    post_start_hooks: Vec<Arc<dyn PostStartHook>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    rate_limiter: Option<Arc<dyn RateLimiter<QueueKey>>>,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches that must report synced before workers start.
    #[must_use]
    pub fn with_informers(mut self, caches: impl IntoIterator<Item = InformerSynced>) -> Self {
        self.caches_to_sync.extend(caches);
        self
    }

    #[must_use]
    pub fn with_sync(mut self, handler: impl SyncHandler + 'static) -> Self {
        self.sync = Some(Arc::new(handler));
        self
    }

    /// Mirror every sync outcome into a `<name>Degraded` condition.
    #[must_use]
    pub fn with_sync_degraded_on_error(mut self, client: Arc<dyn OperatorClient>) -> Self {
        self.sync_degraded_client = Some(client);
        self
    }

    /// Enqueue a resync every `interval`. Zero disables it.
    #[must_use]
    pub const fn resync_every(mut self, interval: Duration) -> Self {
        self.resync_every = interval;
        self
    }

    /// Enqueue a resync on each cron schedule. Validated by [`build`](Self::build).
    #[must_use]
    pub fn resync_schedule<S: Into<String>>(mut self, schedules: impl IntoIterator<Item = S>) -> Self {
        self.resync_schedules.extend(schedules.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_post_start_hooks(
        mut self,
        hooks: impl IntoIterator<Item = Arc<dyn PostStartHook>>,
    ) -> Self {
        self.post_start_hooks.extend(hooks);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter<QueueKey>>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Build a controller named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty name or a missing sync
    /// handler, and [`Error::InvalidSchedule`] for an unparsable schedule.
    pub fn build(self, name: impl Into<String>) -> Result<BaseController> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_config("controller name must not be empty"));
        }
        let sync = self
            .sync
            .ok_or_else(|| Error::invalid_config(format!("controller '{name}' has no sync handler")))?;
        let resync_schedules = self
            .resync_schedules
            .iter()
            .map(|expression| parse_schedule(expression))
            .collect::<Result<Vec<_>>>()?;

        let limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(default_controller_rate_limiter::<QueueKey>()));
        let sync_context = SyncContext::new(RateLimitingQueue::new(limiter));

        Ok(BaseController::from_parts(ControllerParts {
            name,
            caches_to_sync: self.caches_to_sync,
            sync,
            sync_context,
            sync_degraded_client: self.sync_degraded_client,
            resync_every: self.resync_every,
            resync_schedules,
            post_start_hooks: self.post_start_hooks,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(LogErrorHandler)),
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::controller::Controller;
    use crate::error::SyncError;
    use crate::handler::sync_fn;

    fn noop() -> impl SyncHandler + 'static {
        sync_fn(|_ctx, _sync_ctx| async { Ok::<(), SyncError>(()) })
    }

    #[test]
    fn test_build_requires_sync_handler() {
        let err = ControllerBuilder::new().build("NoSync").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_build_requires_name() {
        let err = ControllerBuilder::new().with_sync(noop()).build(" ").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_build_rejects_bad_schedule() {
        let err = ControllerBuilder::new()
            .with_sync(noop())
            .resync_schedule(["not a schedule"])
            .build("BadCron")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule { .. }));
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        let controller = ControllerBuilder::new()
            .with_sync(noop())
            .resync_schedule(["0 * * * *"])
            .build("Defaults")
            .unwrap();

        assert_eq!(controller.name(), "Defaults");
        assert!(controller.queue().is_empty());
        assert!(controller.sync_context().queue_key().is_none());
    }
}
