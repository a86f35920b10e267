//! Messages from workers to the connection manager.
//!
//! Workers never touch manager state.  They send a [`WorkerReport`] tagged
//! with the attempt number they were started for, and the manager's
//! supervisor applies it under the state lock.  Reports for an attempt that
//! has since been replaced or torn down are discarded there.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::Endpoint;
use crate::infrastructure::connector::Link;

/// Monotonic number of a `connect()` call on one manager.
pub type AttemptId = u64;

/// Sending half of the report channel handed to every worker.
pub type ReportSender = mpsc::UnboundedSender<WorkerReport>;

/// Why the error path fired.
///
/// Logged by the manager; the consumer only ever sees
/// [`ConnectionEvent::Error`](crate::ConnectionEvent::Error).
#[derive(Debug, Error)]
pub enum FailureCause {
    /// Name resolution or the TCP handshake failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    /// The handshake did not complete within the connect timeout.
    #[error("connecting to {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: Endpoint, after: Duration },
    /// No complete line arrived within the read timeout.
    #[error("no line received within {0:?}")]
    ReadTimeout(Duration),
    /// The hub closed the stream.
    #[error("stream closed by hub")]
    StreamClosed,
    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    /// Writing or flushing an outbound line failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    /// No heartbeat reply within the heartbeat timeout.
    #[error("no heartbeat reply for {age:?}")]
    HeartbeatStale { age: Duration },
}

/// A result reported by a worker task.
#[derive(Debug)]
pub enum WorkerReport {
    /// The connector opened the socket; the link is ready to be started.
    Established { attempt: AttemptId, link: Link },
    /// The reader received one line.
    Line { attempt: AttemptId, line: String },
    /// A worker detected a failure and has stopped.
    Failed {
        attempt: AttemptId,
        cause: FailureCause,
    },
}

impl WorkerReport {
    pub fn attempt(&self) -> AttemptId {
        match self {
            WorkerReport::Established { attempt, .. }
            | WorkerReport::Line { attempt, .. }
            | WorkerReport::Failed { attempt, .. } => *attempt,
        }
    }
}
