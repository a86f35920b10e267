//! Hub address for one connection attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host and port of the pilight hub.
///
/// The host is kept as a string rather than a `SocketAddr` because the hub is
/// usually addressed by name on the LAN; resolution happens inside the
/// connector so that a DNS failure is reported like any other connect error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
