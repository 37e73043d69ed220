//! # Work Queue
//!
//! Deduplicating, delay-capable, rate-limited work queue for Factory
//! controllers.
//!
//! - An item added while it is already queued is collapsed into one entry.
//! - An item added while it is being processed is parked until the worker
//!   calls [`WorkQueue::done`], so a key is never processed concurrently.
//! - [`RateLimitingQueue::add_rate_limited`] delays re-adds by a per-item
//!   backoff that [`RateLimitingQueue::forget`] resets.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod queue;
mod rate_limiter;
mod rate_limiting;

pub use queue::{InFlight, QueueItem, WorkQueue};
pub use rate_limiter::{
    BucketRateLimiter, ItemExponentialFailureRateLimiter, MaxOfRateLimiter, RateLimiter,
    default_controller_rate_limiter,
};
pub use rate_limiting::RateLimitingQueue;

#[cfg(test)]
mod rate_limiter_test;
