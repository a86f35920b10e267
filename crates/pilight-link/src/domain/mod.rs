//! Domain layer for pilight-link.
//!
//! Pure types shared by the workers and the manager.  Nothing here opens a
//! socket or spawns a task.

pub mod config;
pub mod endpoint;
pub mod events;
pub mod state;
pub mod wire;

pub use config::LinkConfig;
pub use endpoint::Endpoint;
pub use events::{ConnectionEvent, EventSink};
pub use state::ConnectionState;
pub use wire::{InboundLine, HEARTBEAT_PROBE, HEARTBEAT_REPLY};
