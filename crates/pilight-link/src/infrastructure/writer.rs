//! Outbound line writer.
//!
//! Drains the shared [`OutboundQueue`] into the socket, one line per item,
//! each followed by `\n` and a flush.  A line leaves the queue only once it
//! has been flushed: a writer aborted or failing mid-write leaves it at the
//! front for the next connection.  A write failure ends the task and is
//! reported once; the writer never retries on the same socket.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::outbound_queue::OutboundQueue;
use super::report::{AttemptId, FailureCause, ReportSender, WorkerReport};

/// Line writer over the outbound half of the hub socket.
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(256),
        }
    }

    /// Writes `line` plus terminator as a single buffer and flushes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the write or flush fails.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(line.as_bytes());
        self.buf.push(b'\n');

        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await
    }

    /// Writes queued lines in FIFO order until a write fails.  Cancelled by
    /// aborting the task.
    pub async fn run(mut self, queue: Arc<OutboundQueue>, attempt: AttemptId, reports: ReportSender) {
        loop {
            let item = queue.peek().await;
            trace!("attempt {attempt}: -> {}", item.line());

            if let Err(e) = self.write_line(item.line()).await {
                debug!("attempt {attempt}: writer stopped: {e}");
                let _ = reports.send(WorkerReport::Failed {
                    attempt,
                    cause: FailureCause::Write(e),
                });
                return;
            }

            queue.commit(&item);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
