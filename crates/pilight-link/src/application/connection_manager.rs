//! ConnectionManager: owns the link state machine and turns worker results
//! into consumer events.
//!
//! # Ownership model
//!
//! ```text
//!  caller thread(s)                      supervisor task
//!  ────────────────                      ───────────────
//!  connect / disconnect /                recv WorkerReport
//!  start_heartbeat                              │
//!        │                                      │
//!        └──────────> Mutex<Session> <──────────┘
//!                          │
//!             spawns / aborts worker tasks
//!                          │
//!  connector ─┐                                   ┌─> EventSink
//!  reader ────┼── WorkerReport (unbounded mpsc) ──┤
//!  writer ────┤                                   └─> HeartbeatClock
//!  heartbeat ─┘
//!
//!  send() ──> OutboundQueue ──> writer
//! ```
//!
//! Every state transition happens under the single session mutex, either
//! directly in a caller's method or in the supervisor while applying a
//! report.  Workers only ever send reports.  Each report carries the attempt
//! number its worker was started for; the supervisor drops reports whose
//! attempt is no longer current, or that arrive after the state has moved
//! on, so a late line or error from a torn-down socket is never seen by the
//! consumer.
//!
//! # Error latch
//!
//! `error_dispatched` is cleared by `connect()` and set by the first failure
//! of that attempt.  The first failure emits `Error` and tears everything
//! down without a `Disconnected`; any further failure of the same attempt
//! (say the reader and the heartbeat monitor both notice a dead hub) is
//! logged and ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    ConnectionEvent, ConnectionState, Endpoint, EventSink, InboundLine, LinkConfig,
};
use crate::infrastructure::{
    connector, AttemptId, FailureCause, HeartbeatClock, HeartbeatMonitor, Link, OutboundQueue,
    Outbound, ReportSender, WorkerReport,
};

/// Caller-facing errors of the connection manager.
///
/// Link failures are not errors of any method call: they arrive
/// asynchronously as [`ConnectionEvent::Error`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The manager spawns Tokio tasks and must be created inside a runtime.
    #[error("ConnectionManager must be created inside a Tokio runtime")]
    NoRuntime,
    /// `start_heartbeat` was called without an established connection.
    #[error("heartbeat requires an established connection")]
    NotConnected,
}

/// Streaming connection to one pilight hub at a time.
///
/// All methods are synchronous and return without waiting for network I/O.
/// Dropping the manager stops every worker without emitting an event.
pub struct ConnectionManager {
    core: Arc<Core>,
    supervisor: JoinHandle<()>,
}

impl ConnectionManager {
    /// Creates a manager that delivers events on an unbounded channel.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(
        config: LinkConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), LinkError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let manager = Self::with_sink(config, Arc::new(event_tx))?;
        Ok((manager, event_rx))
    }

    /// Creates a manager that delivers events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NoRuntime`] when called outside a Tokio runtime.
    pub fn with_sink(config: LinkConfig, sink: Arc<dyn EventSink>) -> Result<Self, LinkError> {
        let runtime = Handle::try_current().map_err(|_| LinkError::NoRuntime)?;
        let (reports, report_rx) = mpsc::unbounded_channel();

        let core = Arc::new(Core {
            config,
            runtime,
            sink,
            queue: Arc::new(OutboundQueue::new()),
            clock: Arc::new(HeartbeatClock::new()),
            reports,
            session: Mutex::new(Session::default()),
        });

        let supervisor = core.runtime.spawn(supervise(Arc::clone(&core), report_rx));

        Ok(Self { core, supervisor })
    }

    /// Starts connecting to `host:port` in the background.
    ///
    /// Any previous connection is torn down first (emitting `Disconnected`
    /// if it was connected), and an attempt still in flight is cancelled and
    /// replaced.  The outcome arrives later as `Connected` or `Error`.
    pub fn connect(&self, host: impl Into<String>, port: u16) {
        self.core.connect(Endpoint::new(host, port));
    }

    /// Stops all workers and releases the socket.
    ///
    /// Emits `Disconnected` only if the link was connected.  Calling it when
    /// nothing is running does nothing.
    pub fn disconnect(&self) {
        let mut session = self.core.session();
        self.core.teardown(&mut session, Announce::Disconnected);
    }

    /// Queues `message` for the hub.
    ///
    /// Never blocks and never fails.  Lines queued while disconnected are
    /// written, in order, once the next connection is up.
    pub fn send(&self, message: impl Into<String>) {
        self.core.queue.push(Outbound::Application(message.into()));
    }

    /// Starts the heartbeat monitor for the current connection, replacing a
    /// monitor that is already running.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] unless the state is `Connected`.
    pub fn start_heartbeat(&self) -> Result<(), LinkError> {
        self.core.start_heartbeat()
    }

    /// True while the state is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Current state of the link.
    pub fn state(&self) -> ConnectionState {
        self.core.session().state
    }

    /// Endpoint of the most recent `connect()` call.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.core.session().endpoint.clone()
    }

    /// Host of the most recent `connect()` call.
    pub fn host(&self) -> Option<String> {
        self.core.session().endpoint.as_ref().map(|e| e.host.clone())
    }

    /// Port of the most recent `connect()` call.
    pub fn port(&self) -> Option<u16> {
        self.core.session().endpoint.as_ref().map(|e| e.port)
    }

    /// Number of outbound lines not yet written to the hub.
    pub fn pending_outbound(&self) -> usize {
        self.core.queue.len()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut session = self.core.session();
        session.workers.abort_all();
        session.state = ConnectionState::Disconnected;
        drop(session);
        self.supervisor.abort();
    }
}

// ── Shared core ───────────────────────────────────────────────────────────────

struct Core {
    config: LinkConfig,
    runtime: Handle,
    sink: Arc<dyn EventSink>,
    queue: Arc<OutboundQueue>,
    clock: Arc<HeartbeatClock>,
    reports: ReportSender,
    session: Mutex<Session>,
}

/// Everything guarded by the session mutex.
#[derive(Default)]
struct Session {
    state: ConnectionState,
    endpoint: Option<Endpoint>,
    attempt: AttemptId,
    error_dispatched: bool,
    workers: Workers,
}

/// Task handles of the current attempt.
#[derive(Default)]
struct Workers {
    connector: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Workers {
    /// Aborts every running worker and returns how many there were.
    fn abort_all(&mut self) -> usize {
        let handles = [
            self.connector.take(),
            self.reader.take(),
            self.writer.take(),
            self.heartbeat.take(),
        ];
        let mut stopped = 0;
        for handle in handles.into_iter().flatten() {
            handle.abort();
            stopped += 1;
        }
        stopped
    }
}

/// Whether a teardown tells the consumer about a lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Announce {
    /// Caller-initiated: emit `Disconnected` if we were connected.
    Disconnected,
    /// Error path: `Error` has already been emitted.
    Silent,
}

impl Core {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(&self, endpoint: Endpoint) {
        let mut session = self.session();
        self.teardown(&mut session, Announce::Disconnected);

        session.attempt += 1;
        session.error_dispatched = false;
        session.endpoint = Some(endpoint.clone());
        session.state = ConnectionState::Connecting;

        let attempt = session.attempt;
        info!("connecting to {endpoint} (attempt {attempt})");
        session.workers.connector = Some(self.runtime.spawn(connector::run(
            attempt,
            endpoint,
            self.config,
            self.reports.clone(),
        )));
    }

    fn start_heartbeat(&self) -> Result<(), LinkError> {
        let mut session = self.session();
        if !session.state.is_connected() {
            return Err(LinkError::NotConnected);
        }

        if let Some(previous) = session.workers.heartbeat.take() {
            previous.abort();
        }

        self.clock.record_reply();
        let monitor = HeartbeatMonitor::new(
            self.config.heartbeat_interval,
            self.config.heartbeat_timeout,
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
        );
        let attempt = session.attempt;
        debug!("attempt {attempt}: heartbeat started");
        session.workers.heartbeat = Some(
            self.runtime
                .spawn(monitor.run(attempt, self.reports.clone())),
        );
        Ok(())
    }

    /// Applies one worker report under the session lock.
    fn apply(&self, report: WorkerReport) {
        let mut session = self.session();

        if report.attempt() != session.attempt {
            debug!(
                "discarding report from superseded attempt {} (current {})",
                report.attempt(),
                session.attempt
            );
            return;
        }

        match report {
            WorkerReport::Established { attempt, link } => {
                self.start_link(&mut session, attempt, link);
            }
            WorkerReport::Line { line, .. } => self.route_line(&session, line),
            WorkerReport::Failed { cause, .. } => self.dispatch_error(&mut session, cause),
        }
    }

    fn start_link(&self, session: &mut Session, attempt: AttemptId, link: Link) {
        if session.state != ConnectionState::Connecting {
            debug!("attempt {attempt}: link established after teardown; closing it");
            return;
        }

        // The connector task has finished; its handle is no longer needed.
        session.workers.connector = None;

        let purged = self.queue.purge_stale();
        if purged > 0 {
            debug!("attempt {attempt}: purged {purged} stale heartbeat probe(s)");
        }

        let Link {
            peer,
            reader,
            writer,
        } = link;
        session.workers.reader = Some(self.runtime.spawn(reader.run(attempt, self.reports.clone())));
        session.workers.writer = Some(self.runtime.spawn(writer.run(
            Arc::clone(&self.queue),
            attempt,
            self.reports.clone(),
        )));

        session.state = ConnectionState::Connected;
        info!("connected to {peer} (attempt {attempt})");
        self.sink.on_event(ConnectionEvent::Connected);
    }

    fn route_line(&self, session: &Session, line: String) {
        if !session.state.is_connected() {
            debug!("dropping line received after teardown");
            return;
        }

        match InboundLine::classify(line) {
            InboundLine::HeartbeatReply => self.clock.record_reply(),
            InboundLine::Message(text) => {
                self.sink.on_event(ConnectionEvent::MessageReceived(text));
            }
        }
    }

    /// The single error path: at most one `Error` per attempt.
    fn dispatch_error(&self, session: &mut Session, cause: FailureCause) {
        if session.error_dispatched || session.state == ConnectionState::Disconnected {
            debug!(
                "attempt {}: ignoring further failure: {cause}",
                session.attempt
            );
            return;
        }

        session.error_dispatched = true;
        match &session.endpoint {
            Some(endpoint) => warn!("link to {endpoint} failed: {cause}"),
            None => warn!("link failed: {cause}"),
        }

        self.sink.on_event(ConnectionEvent::Error);
        self.teardown(session, Announce::Silent);
    }

    fn teardown(&self, session: &mut Session, announce: Announce) {
        let was_connected = session.state.is_connected();
        let stopped = session.workers.abort_all();
        session.state = ConnectionState::Disconnected;

        if stopped > 0 {
            debug!(
                "attempt {}: stopped {stopped} worker(s)",
                session.attempt
            );
        }

        if was_connected && announce == Announce::Disconnected {
            info!("disconnected (attempt {})", session.attempt);
            self.sink.on_event(ConnectionEvent::Disconnected);
        }
    }
}

/// Applies worker reports in arrival order until the manager is dropped.
async fn supervise(core: Arc<Core>, mut reports: mpsc::UnboundedReceiver<WorkerReport>) {
    while let Some(report) = reports.recv().await {
        core.apply(report);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
