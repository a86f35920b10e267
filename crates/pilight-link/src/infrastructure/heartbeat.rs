//! Application-level keep-alive.
//!
//! TCP alone can take minutes to notice a hub that vanished without closing
//! the socket.  The monitor sends `HEART` every `heartbeat_interval` and
//! declares the link dead once the last `BEAT` reply is older than
//! `heartbeat_timeout`.
//!
//! ```text
//! tick ──> push HEART ──> age = now - clock.last
//!                          │
//!                          ├─ age <  timeout : sleep until next tick
//!                          └─ age >= timeout : report HeartbeatStale, stop
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use super::outbound_queue::{Outbound, OutboundQueue};
use super::report::{AttemptId, FailureCause, ReportSender, WorkerReport};

/// Time of the last heartbeat reply.
///
/// Written by the manager (on start and on every `BEAT`), read by the
/// monitor.
#[derive(Debug)]
pub struct HeartbeatClock {
    last_reply: Mutex<Instant>,
}

impl HeartbeatClock {
    pub fn new() -> Self {
        Self {
            last_reply: Mutex::new(Instant::now()),
        }
    }

    /// Records a reply received now.  Also used to restart the clock when a
    /// monitor starts, so a fresh monitor is never judged stale on its
    /// first tick.
    pub fn record_reply(&self) {
        *self.last_reply() = Instant::now();
    }

    /// Time since the last recorded reply.
    pub fn age(&self) -> Duration {
        self.last_reply().elapsed()
    }

    fn last_reply(&self) -> MutexGuard<'_, Instant> {
        self.last_reply.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeartbeatClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic probe plus staleness check for one connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    period: Duration,
    stale_after: Duration,
    queue: Arc<OutboundQueue>,
    clock: Arc<HeartbeatClock>,
}

impl HeartbeatMonitor {
    pub fn new(
        period: Duration,
        stale_after: Duration,
        queue: Arc<OutboundQueue>,
        clock: Arc<HeartbeatClock>,
    ) -> Self {
        Self {
            period,
            stale_after,
            queue,
            clock,
        }
    }

    /// Runs until the clock goes stale or the task is aborted.
    ///
    /// The first tick fires immediately, so a probe goes out as soon as the
    /// monitor starts.
    pub async fn run(self, attempt: AttemptId, reports: ReportSender) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.queue.push(Outbound::Heartbeat);

            let age = self.clock.age();
            if age >= self.stale_after {
                debug!("attempt {attempt}: heartbeat stale after {age:?}");
                let _ = reports.send(WorkerReport::Failed {
                    attempt,
                    cause: FailureCause::HeartbeatStale { age },
                });
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn monitor(queue: &Arc<OutboundQueue>, clock: &Arc<HeartbeatClock>) -> HeartbeatMonitor {
        HeartbeatMonitor::new(
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Arc::clone(queue),
            Arc::clone(clock),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_age_grows_until_reply_recorded() {
        // Arrange
        let clock = HeartbeatClock::new();

        // Act
        tokio::time::advance(Duration::from_millis(1500)).await;
        let before = clock.age();
        clock.record_reply();

        // Assert
        assert!(before >= Duration::from_millis(1500));
        assert!(clock.age() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_probe_is_sent_immediately() {
        // Arrange
        let queue = Arc::new(OutboundQueue::new());
        let clock = Arc::new(HeartbeatClock::new());
        let (tx, _rx) = mpsc::unbounded_channel();

        // Act
        let task = tokio::spawn(monitor(&queue, &clock).run(1, tx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Assert: exactly one probe, well before the second tick
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().await, Outbound::Heartbeat);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_replies_are_reported_on_the_threshold_tick() {
        // Arrange: interval 1 s, timeout 2 s, no replies ever recorded
        let queue = Arc::new(OutboundQueue::new());
        let clock = Arc::new(HeartbeatClock::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();

        // Act: paused time auto-advances while the monitor sleeps
        monitor(&queue, &clock).run(9, tx).await;

        // Assert: ticks at 0 s, 1 s, 2 s; stale on the third
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(2100));
        assert_eq!(queue.len(), 3);
        assert!(matches!(
            rx.try_recv(),
            Ok(WorkerReport::Failed {
                attempt: 9,
                cause: FailureCause::HeartbeatStale { .. }
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_replies_keep_monitor_alive() {
        // Arrange
        let queue = Arc::new(OutboundQueue::new());
        let clock = Arc::new(HeartbeatClock::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(monitor(&queue, &clock).run(1, tx));

        // Act: answer every probe for ten intervals
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            clock.record_reply();
        }

        // Assert
        assert!(rx.try_recv().is_err(), "no failure while replies arrive");
        assert!(!task.is_finished());
        task.abort();
    }
}
