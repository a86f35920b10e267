//! Application layer for pilight-link.
//!
//! Holds the [`ConnectionManager`](connection_manager::ConnectionManager):
//! the only component that owns connection state and the only one that
//! talks to the consumer.

pub mod connection_manager;

pub use connection_manager::{ConnectionManager, LinkError};
