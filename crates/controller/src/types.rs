//! Core types for the controller: queue keys and the sync context.

use std::fmt;

use factory_workqueue::RateLimitingQueue;
use serde::{Deserialize, Serialize};

/// How the resync key renders in logs and status messages.
pub const DEFAULT_QUEUE_KEY: &str = "key";

/// A work item on a controller queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKey {
    /// Re-run a full resync. Enqueued by periodic and cron triggers.
    Resync,
    /// A key produced by an event on a watched object.
    Object(String),
}

impl QueueKey {
    /// Create an object key.
    pub fn object(key: impl Into<String>) -> Self {
        Self::Object(key.into())
    }

    /// Whether this is the resync key.
    #[must_use]
    pub const fn is_resync(&self) -> bool {
        matches!(self, Self::Resync)
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resync => DEFAULT_QUEUE_KEY,
            Self::Object(key) => key,
        }
    }

    /// An object key with no content. Producers must never enqueue one.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Object(key) if key.trim().is_empty())
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for QueueKey {
    fn from(key: &str) -> Self {
        Self::object(key)
    }
}

impl From<String> for QueueKey {
    fn from(key: String) -> Self {
        Self::Object(key)
    }
}

/// What a sync handler sees: the controller queue and the key being synced.
///
/// One context exists per controller. Workers never mutate it; each dequeue
/// gets its own view from [`with_key`](Self::with_key).
#[derive(Debug, Clone)]
pub struct SyncContext {
    queue: RateLimitingQueue<QueueKey>,
    queue_key: Option<QueueKey>,
}

impl SyncContext {
    /// Create a context around a queue, with no current key.
    #[must_use]
    pub const fn new(queue: RateLimitingQueue<QueueKey>) -> Self {
        Self {
            queue,
            queue_key: None,
        }
    }

    /// The controller queue.
    #[must_use]
    pub const fn queue(&self) -> &RateLimitingQueue<QueueKey> {
        &self.queue
    }

    /// The key being synced. `None` outside a sync invocation (e.g. hooks).
    #[must_use]
    pub const fn queue_key(&self) -> Option<&QueueKey> {
        self.queue_key.as_ref()
    }

    /// A per-invocation view carrying `key`.
    #[must_use]
    pub fn with_key(&self, key: QueueKey) -> Self {
        Self {
            queue: self.queue.clone(),
            queue_key: Some(key),
        }
    }

    /// Enqueue a key on the controller queue.
    pub fn enqueue(&self, key: impl Into<QueueKey>) {
        self.queue.add(key.into());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn test_resync_renders_as_default_key() {
        assert_eq!(QueueKey::Resync.to_string(), DEFAULT_QUEUE_KEY);
        assert!(QueueKey::Resync.is_resync());
    }

    #[test]
    fn test_object_named_like_default_key_is_not_resync() {
        let key = QueueKey::from(DEFAULT_QUEUE_KEY);
        assert!(!key.is_resync());
        assert_ne!(key, QueueKey::Resync);
    }

    #[test]
    fn test_blank_keys() {
        assert!(QueueKey::object("").is_blank());
        assert!(QueueKey::object("  ").is_blank());
        assert!(!QueueKey::object("ns/name").is_blank());
        assert!(!QueueKey::Resync.is_blank());
    }

    #[tokio::test]
    async fn test_with_key_does_not_touch_shared_context() {
        let ctx = SyncContext::new(RateLimitingQueue::default());
        let view = ctx.with_key(QueueKey::object("ns/a"));

        assert_eq!(view.queue_key(), Some(&QueueKey::object("ns/a")));
        assert_eq!(ctx.queue_key(), None);
    }

    #[tokio::test]
    async fn test_enqueue_shares_queue_across_views() {
        let ctx = SyncContext::new(RateLimitingQueue::default());
        let view = ctx.with_key(QueueKey::Resync);

        view.enqueue("ns/b");
        assert_eq!(ctx.queue().len(), 1);
        let item = ctx.queue().get().await;
        assert_eq!(item, Some(QueueKey::object("ns/b")));
    }
}
