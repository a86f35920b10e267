//! Connection state of the link.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`ConnectionManager`](crate::ConnectionManager).
///
/// ```text
/// Disconnected --connect()--> Connecting --established--> Connected
///      ^                          |                           |
///      +------ error path --------+---- disconnect() / error -+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No socket and no attempt in flight.
    #[default]
    Disconnected,
    /// The connector is resolving and dialing the hub.
    Connecting,
    /// Reader and writer are running on a live socket.
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}
