//! Infrastructure layer for pilight-link.
//!
//! Everything that touches the socket or a timer lives here.  Each worker
//! runs as its own Tokio task, owns exactly the resources it needs, and
//! reports back to the manager through a [`report::WorkerReport`] channel.
//!
//! | Worker             | Owns                       | Blocks on            |
//! |--------------------|----------------------------|----------------------|
//! | `connector::run`   | nothing yet                | DNS + TCP handshake  |
//! | `LineReader::run`  | inbound half of the socket | next line / timeout  |
//! | `LineWriter::run`  | outbound half              | outbound queue peek  |
//! | `HeartbeatMonitor` | shared queue + clock       | interval tick        |
//!
//! All of them are cancelled by aborting their task, which drops whatever
//! socket half they hold.

pub mod connector;
pub mod heartbeat;
pub mod outbound_queue;
pub mod reader;
pub mod report;
pub mod writer;

pub use connector::Link;
pub use heartbeat::{HeartbeatClock, HeartbeatMonitor};
pub use outbound_queue::{Outbound, OutboundQueue};
pub use reader::LineReader;
pub use report::{AttemptId, FailureCause, ReportSender, WorkerReport};
pub use writer::LineWriter;
