//! Queue-driven reconciliation controllers.
//!
//! A controller reacts to keys on a rate-limited work queue:
//!
//! - **Producers** (event handlers, resync triggers) enqueue [`QueueKey`]s
//! - **Workers** dequeue keys and invoke the [`SyncHandler`]
//! - **Failures** are requeued with per-key exponential backoff
//! - **Status** optionally mirrors sync outcomes into a `<name>Degraded` condition
//!
//! The queue never hands the same key to two workers at once, and a key
//! enqueued many times while waiting is processed once.
//!
//! # Example
//!
//! ```ignore
//! use factory_controller::{ControllerBuilder, SyncError, sync_fn};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> factory_core::Result<()> {
//!     let controller = ControllerBuilder::new()
//!         .with_sync(sync_fn(|_ctx, sync_ctx| async move {
//!             tracing::info!(key = ?sync_ctx.queue_key(), "Syncing");
//!             Ok::<(), SyncError>(())
//!         }))
//!         .resync_every(Duration::from_secs(30))
//!         .build("Example")?;
//!
//!     let ctx = CancellationToken::new();
//!     controller.run(ctx, 2).await
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod builder;
pub mod cache;
pub mod controller;
pub mod error;
pub mod handler;
pub mod status;
pub mod trigger;
pub mod types;

// Re-export main types
pub use builder::ControllerBuilder;
pub use cache::{InformerSynced, informer_synced, wait_for_cache_sync, wait_for_named_cache_sync};
pub use controller::{BaseController, Controller, REASON_AS_EXPECTED, REASON_SYNC_ERROR};
pub use error::{SyncError, SyncResult};
pub use handler::{HookFn, PostStartHook, SyncFn, SyncHandler, hook_fn, sync_fn};
pub use status::{
    ConditionStatus, InMemoryOperatorClient, OperatorClient, OperatorCondition, OperatorStatus,
    StatusUpdate, UpdateStatusFn, find_operator_condition, set_operator_condition,
    update_condition_fn, update_status,
};
pub use trigger::parse_schedule;
pub use types::{DEFAULT_QUEUE_KEY, QueueKey, SyncContext};
