//! Resync triggers: a fixed interval and cron schedules.
//!
//! Both only ever enqueue [`QueueKey::Resync`]; the queue collapses
//! triggers that arrive while a resync is already pending.

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use factory_core::{Error, Result};
use factory_workqueue::RateLimitingQueue;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::QueueKey;

/// Parse a cron expression.
///
/// Accepts the standard five fields (minute precision) as well as the
/// six or seven field form with seconds and year.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };

    Schedule::from_str(&normalized)
        .map_err(|e| Error::invalid_schedule(expression, e.to_string()))
}

/// Enqueue a resync now and then every `interval` until `ctx` is cancelled.
///
/// The interval runs from the end of the previous enqueue, so a stalled
/// runtime never produces a burst of catch-up ticks. A zero interval
/// disables periodic resync and returns immediately.
pub async fn run_periodic_resync(
    controller: String,
    queue: RateLimitingQueue<QueueKey>,
    interval: Duration,
    ctx: CancellationToken,
) {
    if interval.is_zero() {
        debug!(controller = %controller, "Periodic resync disabled");
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = ctx.cancelled() => break,
            _ = ticker.tick() => {
                debug!(controller = %controller, "Triggering periodic resync");
                queue.add(QueueKey::Resync);
            }
        }
    }
}

/// Enqueue a resync at every fire time of `schedule` until `stop` is cancelled.
pub fn spawn_scheduled_resync(
    controller: &str,
    queue: RateLimitingQueue<QueueKey>,
    schedule: Schedule,
    stop: CancellationToken,
) -> JoinHandle<()> {
    let controller = controller.to_string();
    tokio::spawn(async move {
        let mut after = Utc::now();
        loop {
            let Some(next) = schedule.after(&after).next() else {
                debug!(controller = %controller, "Schedule has no further fire times");
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                () = stop.cancelled() => return,
                () = tokio::time::sleep(delay) => {
                    debug!(controller = %controller, "Triggering scheduled controller run");
                    queue.add(QueueKey::Resync);
                }
            }
            after = next.max(Utc::now());
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn test_parse_standard_five_field_schedule() {
        let schedule = parse_schedule("*/5 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(chrono::Timelike::second(&next), 0);
    }

    #[test]
    fn test_parse_six_field_schedule() {
        assert!(parse_schedule("*/10 * * * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid_schedule() {
        let err = parse_schedule("every tuesday").unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule { .. }));
        assert!(err.to_string().contains("every tuesday"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_resync_fires_immediately_then_on_interval() {
        let queue = RateLimitingQueue::default();
        let ctx = CancellationToken::new();
        let task = tokio::spawn(run_periodic_resync(
            "test".to_string(),
            queue.clone(),
            Duration::from_secs(30),
            ctx.clone(),
        ));

        let first = timeout(Duration::from_secs(1), queue.get()).await.unwrap();
        assert_eq!(first, Some(QueueKey::Resync));
        queue.done(&QueueKey::Resync);

        let second = timeout(Duration::from_secs(31), queue.get()).await.unwrap();
        assert_eq!(second, Some(QueueKey::Resync));
        queue.done(&QueueKey::Resync);

        ctx.cancel();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_periodic_resync_with_zero_interval_returns() {
        let queue = RateLimitingQueue::default();

        timeout(
            Duration::from_secs(1),
            run_periodic_resync("test".to_string(), queue.clone(), Duration::ZERO, CancellationToken::new()),
        )
        .await
        .unwrap();

        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_resync_fires_and_stops() {
        let queue = RateLimitingQueue::default();
        let stop = CancellationToken::new();
        let schedule = parse_schedule("* * * * * *").unwrap();
        let task = spawn_scheduled_resync("test", queue.clone(), schedule, stop.clone());

        let item = timeout(Duration::from_secs(3), queue.get()).await.unwrap();
        assert_eq!(item, Some(QueueKey::Resync));

        stop.cancel();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
