//! Events handed to the presentation layer.
//!
//! The link reports everything through four events.  Error subtypes are
//! deliberately absent: the consumer only needs to know the link is gone and
//! decide for itself whether to reconnect.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// A notification from the connection manager to its consumer.
///
/// Within one connection attempt the consumer observes, in order:
///
/// 1. at most one `Connected`,
/// 2. any number of `MessageReceived`,
/// 3. at most one of `Disconnected` or `Error`, never both.
///
/// A failed attempt that never connected produces a lone `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "message", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// The socket is up; reader and writer are running.
    Connected,
    /// The caller disconnected a previously connected link.
    Disconnected,
    /// The link failed (connect, read, write, or heartbeat) and was torn down.
    Error,
    /// One non-heartbeat line from the hub, without its terminator.
    MessageReceived(String),
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Connected => f.write_str("connected"),
            ConnectionEvent::Disconnected => f.write_str("disconnected"),
            ConnectionEvent::Error => f.write_str("error"),
            ConnectionEvent::MessageReceived(line) => write!(f, "message: {line}"),
        }
    }
}

/// Consumer boundary for [`ConnectionEvent`]s.
///
/// `on_event` is invoked while the manager holds its state lock, which is what
/// keeps `Connected` ahead of every later event.  Implementations must return
/// quickly and must not call back into the manager; hand the event to a
/// channel or another task instead.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: ConnectionEvent);
}

impl EventSink for mpsc::UnboundedSender<ConnectionEvent> {
    fn on_event(&self, event: ConnectionEvent) {
        if let Err(mpsc::error::SendError(event)) = self.send(event) {
            debug!("event receiver dropped; discarding {event}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
