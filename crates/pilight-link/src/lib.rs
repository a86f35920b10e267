//! # pilight-link
//!
//! Streaming connection manager for a pilight home-automation hub.
//!
//! The hub speaks a line-oriented text protocol over a single TCP socket.
//! This crate keeps that socket alive and turns everything that happens on
//! it into a small set of events for the presentation layer:
//!
//! - **`domain`** – Pure types with no I/O: timing configuration, the hub
//!   endpoint, connection state, the events handed to the consumer, and the
//!   reserved heartbeat tokens.
//!
//! - **`infrastructure`** – The workers that touch the socket.  The
//!   connector opens it, the reader pulls lines out of it, the writer drains
//!   the shared outbound queue into it, and the heartbeat monitor probes the
//!   hub and watches for replies.
//!
//! - **`application`** – The [`ConnectionManager`], which owns the state
//!   machine, starts and stops workers, filters inbound lines, and collapses
//!   every failure into exactly one [`ConnectionEvent::Error`].
//!
//! # Quick start
//!
//! ```no_run
//! use pilight_link::{ConnectionEvent, ConnectionManager, LinkConfig};
//!
//! # async fn example() -> Result<(), pilight_link::LinkError> {
//! let (manager, mut events) = ConnectionManager::new(LinkConfig::default())?;
//! manager.connect("192.168.1.20", 5000);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ConnectionEvent::Connected => manager.start_heartbeat()?,
//!         ConnectionEvent::MessageReceived(line) => println!("{line}"),
//!         ConnectionEvent::Error | ConnectionEvent::Disconnected => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::connection_manager::{ConnectionManager, LinkError};
pub use domain::config::LinkConfig;
pub use domain::endpoint::Endpoint;
pub use domain::events::{ConnectionEvent, EventSink};
pub use domain::state::ConnectionState;
pub use domain::wire::{HEARTBEAT_PROBE, HEARTBEAT_REPLY};
