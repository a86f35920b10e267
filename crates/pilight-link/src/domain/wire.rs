//! Reserved tokens of the hub's line protocol.
//!
//! Everything on the wire is a UTF-8 line terminated by `\n`.  Two lines are
//! reserved for the keep-alive exchange; every other line is an application
//! message that this crate passes through untouched.

/// Keep-alive probe written by the heartbeat monitor.
pub const HEARTBEAT_PROBE: &str = "HEART";

/// Keep-alive reply sent by the hub in answer to [`HEARTBEAT_PROBE`].
pub const HEARTBEAT_REPLY: &str = "BEAT";

/// Classification of one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// The hub answered a heartbeat probe.
    HeartbeatReply,
    /// Any other line, carried verbatim.
    Message(String),
}

impl InboundLine {
    /// Classifies a line read from the socket (terminator already removed).
    pub fn classify(line: String) -> Self {
        if line == HEARTBEAT_REPLY {
            InboundLine::HeartbeatReply
        } else {
            InboundLine::Message(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_is_heartbeat_reply() {
        assert_eq!(
            InboundLine::classify("BEAT".to_string()),
            InboundLine::HeartbeatReply
        );
    }

    #[test]
    fn test_application_line_is_passed_through_verbatim() {
        assert_eq!(
            InboundLine::classify("temp=21".to_string()),
            InboundLine::Message("temp=21".to_string())
        );
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        // Only the bare token counts as a reply.
        for line in ["beat", "BEAT ", " BEAT", "BEATS", "HEART"] {
            assert!(
                matches!(InboundLine::classify(line.to_string()), InboundLine::Message(_)),
                "{line:?} must be an application message"
            );
        }
    }

    #[test]
    fn test_empty_line_is_an_application_message() {
        assert_eq!(
            InboundLine::classify(String::new()),
            InboundLine::Message(String::new())
        );
    }
}
