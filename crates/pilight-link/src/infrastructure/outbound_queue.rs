//! Unbounded FIFO between line producers and the single socket writer.
//!
//! Any caller of `send()` and the heartbeat monitor push into the queue; the
//! writer of the current connection is the only consumer.  The queue belongs
//! to the manager, not to a connection, so lines pushed while disconnected
//! wait here for the next writer.
//!
//! The backlog must outlive the writer task.  Writers are aborted on every
//! teardown and an aborted task drops what it owns, so the queue is a
//! `VecDeque` held by the manager and the writer only borrows it through an
//! `Arc`, parking on a [`Notify`] while it is empty.  The writer only
//! removes a line after it has been written and flushed, so a writer aborted
//! mid-write leaves that line at the front for the next connection.
//!
//! There is no capacity bound: a slow hub makes the queue grow.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::domain::HEARTBEAT_PROBE;

/// One queued outbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A line submitted through `send()`.
    Application(String),
    /// A keep-alive probe from the heartbeat monitor.
    Heartbeat,
}

impl Outbound {
    /// The text written to the socket, without terminator.
    pub fn line(&self) -> &str {
        match self {
            Outbound::Application(line) => line,
            Outbound::Heartbeat => HEARTBEAT_PROBE,
        }
    }
}

/// Multi-producer, single-consumer FIFO of outbound lines.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<Outbound>>,
    ready: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` and wakes the writer.  Never blocks on I/O.
    pub fn push(&self, item: Outbound) {
        self.items().push_back(item);
        // `notify_one` stores a permit when the writer is not yet waiting,
        // so a push between `peek` and `notified` is not lost.
        self.ready.notify_one();
    }

    /// Waits until an item is available and returns a copy of the oldest one,
    /// leaving it queued.
    ///
    /// Cancel-safe: dropping the future never changes the queue.
    pub async fn peek(&self) -> Outbound {
        loop {
            if let Some(item) = self.items().front().cloned() {
                return item;
            }
            self.ready.notified().await;
        }
    }

    /// Removes the oldest item once it has been written, provided it is still
    /// `item`.  Returns whether anything was removed.
    pub fn commit(&self, item: &Outbound) -> bool {
        let mut items = self.items();
        if items.front() == Some(item) {
            items.pop_front();
            true
        } else {
            false
        }
    }

    /// Drops heartbeat probes left over from a previous connection.
    ///
    /// Application lines are kept in order; they were submitted by the caller
    /// and are still owed to the hub.
    pub fn purge_stale(&self) -> usize {
        let mut items = self.items();
        let before = items.len();
        items.retain(|item| !matches!(item, Outbound::Heartbeat));
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<Outbound>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
