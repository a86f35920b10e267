//! Connection establishment.
//!
//! The connector runs once per `connect()` call.  It resolves the hub's host
//! name, completes the TCP handshake within `connect_timeout`, and splits the
//! stream into the reader and writer for the new connection.  It does not
//! start them: the manager does that under its state lock, after checking
//! that this attempt is still the current one.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::reader::LineReader;
use super::report::{AttemptId, FailureCause, ReportSender, WorkerReport};
use super::writer::LineWriter;
use crate::domain::{Endpoint, LinkConfig};

/// A freshly opened socket, split and wrapped, waiting to be started.
#[derive(Debug)]
pub struct Link {
    pub peer: SocketAddr,
    pub reader: LineReader<BufReader<OwnedReadHalf>>,
    pub writer: LineWriter<OwnedWriteHalf>,
}

/// Opens a TCP connection to `endpoint` and wraps both halves.
///
/// # Errors
///
/// - [`FailureCause::ConnectTimeout`] if resolution plus handshake exceed
///   `config.connect_timeout`.
/// - [`FailureCause::Connect`] for DNS failures, refused connections, and
///   unreachable networks.
pub async fn establish(endpoint: &Endpoint, config: &LinkConfig) -> Result<Link, FailureCause> {
    let dial = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    let stream = dial_within(endpoint, config.connect_timeout, dial).await?;

    // Commands are short single lines; do not hold them back for coalescing.
    if let Err(e) = stream.set_nodelay(true) {
        warn!("could not disable Nagle on link to {endpoint}: {e}");
    }

    let peer = stream.peer_addr().map_err(|source| FailureCause::Connect {
        endpoint: endpoint.clone(),
        source,
    })?;

    let (read_half, write_half) = stream.into_split();

    Ok(Link {
        peer,
        reader: LineReader::new(BufReader::new(read_half), config.read_timeout),
        writer: LineWriter::new(write_half),
    })
}

/// Bounds `dial` (name resolution plus handshake) by `limit`.
async fn dial_within<S>(
    endpoint: &Endpoint,
    limit: Duration,
    dial: impl Future<Output = io::Result<S>>,
) -> Result<S, FailureCause> {
    timeout(limit, dial)
        .await
        .map_err(|_| FailureCause::ConnectTimeout {
            endpoint: endpoint.clone(),
            after: limit,
        })?
        .map_err(|source| FailureCause::Connect {
            endpoint: endpoint.clone(),
            source,
        })
}

/// Connector task body: one establishment attempt, one report.
pub async fn run(attempt: AttemptId, endpoint: Endpoint, config: LinkConfig, reports: ReportSender) {
    debug!("attempt {attempt}: connecting to {endpoint}");

    let report = match establish(&endpoint, &config).await {
        Ok(link) => WorkerReport::Established { attempt, link },
        Err(cause) => WorkerReport::Failed { attempt, cause },
    };

    if reports.send(report).is_err() {
        debug!("attempt {attempt}: manager gone before connect finished");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// Returns a loopback port with nothing listening on it.
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_establish_connects_to_listening_hub() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = Endpoint::new("127.0.0.1", addr.port());
        let config = LinkConfig::default();

        // Act
        let (link, accepted) = tokio::join!(establish(&endpoint, &config), listener.accept());

        // Assert
        let link = link.expect("connect must succeed");
        assert_eq!(link.peer, addr);
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_establish_reports_refused_connection() {
        let endpoint = Endpoint::new("127.0.0.1", closed_port().await);

        let result = establish(&endpoint, &LinkConfig::default()).await;

        assert!(matches!(result, Err(FailureCause::Connect { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_dial_times_out_after_connect_timeout() {
        // Arrange: a dial that never completes, as with a black-holed host
        let endpoint = Endpoint::new("10.255.255.1", 5000);
        let limit = Duration::from_millis(5000);
        let started = tokio::time::Instant::now();

        // Act
        let result = dial_within(&endpoint, limit, std::future::pending::<io::Result<()>>()).await;

        // Assert
        assert!(started.elapsed() >= limit);
        match result {
            Err(FailureCause::ConnectTimeout { endpoint: failed, after }) => {
                assert_eq!(failed, endpoint);
                assert_eq!(after, limit);
            }
            other => panic!("expected ConnectTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_lookup_maps_to_connect_error() {
        // Arrange
        let endpoint = Endpoint::new("no-such-hub.invalid", 5000);
        let lookup = async {
            Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "no such host"))
        };

        // Act
        let result = dial_within(&endpoint, Duration::from_secs(5), lookup).await;

        // Assert
        assert!(matches!(result, Err(FailureCause::Connect { .. })));
    }

    #[tokio::test]
    async fn test_run_sends_exactly_one_report() {
        // Arrange
        let endpoint = Endpoint::new("127.0.0.1", closed_port().await);
        let config = LinkConfig {
            connect_timeout: Duration::from_millis(500),
            ..LinkConfig::default()
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        // Act
        run(4, endpoint, config, tx).await;

        // Assert
        assert!(matches!(
            rx.recv().await,
            Some(WorkerReport::Failed { attempt: 4, .. })
        ));
        assert!(rx.recv().await.is_none(), "sender dropped after one report");
    }
}
