//! Work queue with rate-limited re-adds.

use std::sync::Arc;
use std::time::Duration;

use crate::queue::{InFlight, QueueItem, WorkQueue};
use crate::rate_limiter::{RateLimiter, default_controller_rate_limiter};

/// A [`WorkQueue`] whose failed items come back after a backoff.
///
/// Cloning is cheap and every clone refers to the same queue.
pub struct RateLimitingQueue<T> {
    queue: WorkQueue<T>,
    limiter: Arc<dyn RateLimiter<T>>,
}

impl<T> Clone for RateLimitingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<T: QueueItem> std::fmt::Debug for RateLimitingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitingQueue")
            .field("len", &self.queue.len())
            .field("shutting_down", &self.queue.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl<T: QueueItem> Default for RateLimitingQueue<T> {
    fn default() -> Self {
        Self::new(Arc::new(default_controller_rate_limiter::<T>()))
    }
}

impl<T: QueueItem> RateLimitingQueue<T> {
    /// Create a queue using the given limiter for re-adds.
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter<T>>) -> Self {
        Self {
            queue: WorkQueue::new(),
            limiter,
        }
    }

    /// Enqueue an item right away. See [`WorkQueue::add`].
    pub fn add(&self, item: T) {
        self.queue.add(item);
    }

    /// Enqueue an item after `delay`. See [`WorkQueue::add_after`].
    pub fn add_after(&self, item: T, delay: Duration) {
        self.queue.add_after(item, delay);
    }

    /// Enqueue an item once the limiter says it may come back.
    pub fn add_rate_limited(&self, item: T) {
        let delay = self.limiter.when(&item);
        self.queue.add_after(item, delay);
    }

    /// Reset the backoff of an item. Does not remove it from the queue.
    pub fn forget(&self, item: &T) {
        self.limiter.forget(item);
    }

    /// How many times `item` has been rate-limited since it was forgotten.
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.limiter.num_requeues(item)
    }

    /// Wait for the next item. See [`WorkQueue::get`].
    pub async fn get(&self) -> Option<T> {
        self.queue.get().await
    }

    /// Wait for the next item, guarded. See [`WorkQueue::acquire`].
    pub async fn acquire(&self) -> Option<InFlight<T>> {
        self.queue.acquire().await
    }

    /// Mark an item as finished processing. See [`WorkQueue::done`].
    pub fn done(&self, item: &T) {
        self.queue.done(item);
    }

    /// Shut the queue down. See [`WorkQueue::shut_down`].
    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    /// Number of delayed re-adds still waiting. See [`WorkQueue::pending_delayed`].
    pub fn pending_delayed(&self) -> usize {
        self.queue.pending_delayed()
    }

    /// Wait for every delayed re-add to finish. See [`WorkQueue::wait_for_delayed`].
    pub async fn wait_for_delayed(&self) {
        self.queue.wait_for_delayed().await;
    }

    /// Whether the queue has been shut down.
    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }

    /// Number of items waiting to be handed out.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if no items are waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
