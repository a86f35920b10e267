//! Link timing configuration.
//!
//! [`LinkConfig`] holds every timing knob of the streaming link.  It is a
//! plain struct so tests can build one with tiny timeouts, and it derives
//! serde so the binary can read it from the `[timing]` table of its TOML
//! file.
//!
//! On disk every value is an integer number of milliseconds:
//!
//! ```toml
//! [timing]
//! connect_timeout_ms = 5000
//! read_timeout_ms = 5000
//! heartbeat_interval_ms = 1000
//! heartbeat_timeout_ms = 2000
//! ```
//!
//! Absent keys fall back to the defaults below, so an empty table is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on TCP connect (including name resolution).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default bound on a single line read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default period between `HEART` probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
/// Default age of the last `BEAT` reply at which the link is declared dead.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Timing configuration shared by all workers of one [`ConnectionManager`].
///
/// [`ConnectionManager`]: crate::ConnectionManager
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pilight_link::LinkConfig;
///
/// let cfg = LinkConfig::default();
/// assert_eq!(cfg.heartbeat_interval, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Upper bound on resolving the host and completing the TCP handshake.
    #[serde(
        rename = "connect_timeout_ms",
        with = "duration_ms",
        default = "default_connect_timeout"
    )]
    pub connect_timeout: Duration,

    /// Upper bound on waiting for one inbound line.  A quiet hub that sends
    /// nothing for this long is treated as a dead link.
    #[serde(
        rename = "read_timeout_ms",
        with = "duration_ms",
        default = "default_read_timeout"
    )]
    pub read_timeout: Duration,

    /// Period of the heartbeat monitor.
    #[serde(
        rename = "heartbeat_interval_ms",
        with = "duration_ms",
        default = "default_heartbeat_interval"
    )]
    pub heartbeat_interval: Duration,

    /// Staleness threshold for the heartbeat clock.
    #[serde(
        rename = "heartbeat_timeout_ms",
        with = "duration_ms",
        default = "default_heartbeat_timeout"
    )]
    pub heartbeat_timeout: Duration,
}

impl Default for LinkConfig {
    /// | Field              | Default |
    /// |--------------------|---------|
    /// | connect_timeout    | 5000 ms |
    /// | read_timeout       | 5000 ms |
    /// | heartbeat_interval | 1000 ms |
    /// | heartbeat_timeout  | 2000 ms |
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}
fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}
fn default_heartbeat_interval() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}
fn default_heartbeat_timeout() -> Duration {
    DEFAULT_HEARTBEAT_TIMEOUT
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_connect_timeout_is_5s() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_default_read_timeout_is_5s() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.read_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_default_heartbeat_interval_is_1s() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_default_heartbeat_timeout_is_2s() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.heartbeat_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_empty_toml_table_yields_defaults() {
        // Arrange / Act
        let cfg: LinkConfig = toml::from_str("").expect("empty table must parse");

        // Assert
        assert_eq!(cfg, LinkConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_fields() {
        // Arrange
        let text = "heartbeat_interval_ms = 250\nread_timeout_ms = 900\n";

        // Act
        let cfg: LinkConfig = toml::from_str(text).expect("partial table must parse");

        // Assert
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(cfg.read_timeout, Duration::from_millis(900));
        assert_eq!(cfg.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(cfg.heartbeat_timeout, DEFAULT_HEARTBEAT_TIMEOUT);
    }

    #[test]
    fn test_serialized_form_uses_millisecond_keys() {
        let text = toml::to_string(&LinkConfig::default()).expect("serialize");
        assert!(text.contains("connect_timeout_ms = 5000"));
        assert!(text.contains("heartbeat_timeout_ms = 2000"));
    }
}
