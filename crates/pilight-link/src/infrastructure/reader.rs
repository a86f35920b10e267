//! Inbound line reader.
//!
//! Pulls one `\n`-terminated line at a time off the socket and forwards it to
//! the manager.  The reader never retries: the first timeout, EOF, or I/O
//! error is reported once as a [`FailureCause`] and the task ends.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::timeout;
use tracing::{debug, trace};

use super::report::{AttemptId, FailureCause, ReportSender, WorkerReport};

/// Line-at-a-time reader over the inbound half of the hub socket.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    read_timeout: Duration,
    buf: String,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R, read_timeout: Duration) -> Self {
        Self {
            inner,
            read_timeout,
            buf: String::with_capacity(256),
        }
    }

    /// Reads the next line with its `\n` (and any `\r` before it) removed.
    ///
    /// # Errors
    ///
    /// - [`FailureCause::ReadTimeout`] if no complete line arrives in time.
    /// - [`FailureCause::StreamClosed`] on EOF, including EOF in the middle
    ///   of an unterminated line.
    /// - [`FailureCause::Read`] on any I/O error, including invalid UTF-8.
    pub async fn next_line(&mut self) -> Result<String, FailureCause> {
        self.buf.clear();
        let limit = self.read_timeout;

        let read = timeout(limit, self.inner.read_line(&mut self.buf))
            .await
            .map_err(|_| FailureCause::ReadTimeout(limit))?;

        match read {
            Ok(0) => Err(FailureCause::StreamClosed),
            Ok(_) if !self.buf.ends_with('\n') => Err(FailureCause::StreamClosed),
            Ok(_) => Ok(strip_terminator(&self.buf).to_string()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FailureCause::StreamClosed),
            Err(e) => Err(FailureCause::Read(e)),
        }
    }

    /// Forwards lines to the manager until the stream fails or the manager
    /// goes away.  Cancelled by aborting the task.
    pub async fn run(mut self, attempt: AttemptId, reports: ReportSender) {
        loop {
            match self.next_line().await {
                Ok(line) => {
                    trace!("attempt {attempt}: <- {line}");
                    if reports.send(WorkerReport::Line { attempt, line }).is_err() {
                        debug!("attempt {attempt}: manager gone; reader exiting");
                        return;
                    }
                }
                Err(cause) => {
                    debug!("attempt {attempt}: reader stopped: {cause}");
                    let _ = reports.send(WorkerReport::Failed { attempt, cause });
                    return;
                }
            }
        }
    }
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
