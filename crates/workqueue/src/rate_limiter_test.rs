//! Tests for backoff policies and the rate-limited queue.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::rate_limiter::{
    BucketRateLimiter, ItemExponentialFailureRateLimiter, MaxOfRateLimiter, RateLimiter,
};
use crate::rate_limiting::RateLimitingQueue;

#[test]
fn test_exponential_backoff_doubles_per_failure() {
    let limiter =
        ItemExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_secs(1));

    assert_eq!(limiter.when(&"one"), Duration::from_millis(1));
    assert_eq!(limiter.when(&"one"), Duration::from_millis(2));
    assert_eq!(limiter.when(&"one"), Duration::from_millis(4));
    assert_eq!(limiter.num_requeues(&"one"), 3);

    // Other items have their own counters
    assert_eq!(limiter.when(&"two"), Duration::from_millis(1));
}

#[test]
fn test_exponential_backoff_is_capped() {
    let limiter =
        ItemExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_millis(3));

    for _ in 0..64 {
        let _ = limiter.when(&"key");
    }
    assert_eq!(limiter.when(&"key"), Duration::from_millis(3));
}

#[test]
fn test_forget_resets_backoff() {
    let limiter =
        ItemExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_secs(1));
    let _ = limiter.when(&"key");
    let _ = limiter.when(&"key");

    limiter.forget(&"key");

    assert_eq!(limiter.num_requeues(&"key"), 0);
    assert_eq!(limiter.when(&"key"), Duration::from_millis(1));
}

#[test]
fn test_bucket_allows_burst_then_throttles() {
    let limiter = BucketRateLimiter::new(1.0, 2);

    assert_eq!(RateLimiter::<&str>::when(&limiter, &"a"), Duration::ZERO);
    assert_eq!(RateLimiter::<&str>::when(&limiter, &"b"), Duration::ZERO);
    assert!(RateLimiter::<&str>::when(&limiter, &"c") > Duration::ZERO);
}

#[test]
fn test_max_of_picks_slowest() {
    let slow: Box<dyn RateLimiter<&str>> = Box::new(ItemExponentialFailureRateLimiter::new(
        Duration::from_millis(10),
        Duration::from_secs(1),
    ));
    let fast: Box<dyn RateLimiter<&str>> = Box::new(ItemExponentialFailureRateLimiter::new(
        Duration::from_millis(1),
        Duration::from_secs(1),
    ));
    let limiter = MaxOfRateLimiter::new(vec![slow, fast]);

    assert_eq!(limiter.when(&"key"), Duration::from_millis(10));
    assert_eq!(limiter.num_requeues(&"key"), 1);

    limiter.forget(&"key");
    assert_eq!(limiter.num_requeues(&"key"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_add_rate_limited_comes_back_after_backoff() {
    let limiter: Arc<dyn RateLimiter<&str>> = Arc::new(ItemExponentialFailureRateLimiter::new(
        Duration::from_secs(2),
        Duration::from_secs(60),
    ));
    let queue = RateLimitingQueue::new(limiter);
    let start = tokio::time::Instant::now();

    queue.add_rate_limited("key");
    assert!(queue.is_empty());
    assert_eq!(queue.num_requeues(&"key"), 1);

    let item = timeout(Duration::from_secs(10), queue.get())
        .await
        .expect("rate limited item should come back");
    assert_eq!(item, Some("key"));
    assert!(start.elapsed() >= Duration::from_secs(2));

    queue.forget(&"key");
    assert_eq!(queue.num_requeues(&"key"), 0);
}

#[tokio::test]
async fn test_default_queue_accepts_plain_adds() {
    let queue: RateLimitingQueue<String> = RateLimitingQueue::default();
    queue.add("key".to_string());
    assert_eq!(queue.len(), 1);

    let guard = queue.acquire().await.expect("item should be available");
    assert_eq!(guard.item(), "key");
}
