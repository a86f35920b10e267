//! Rendering of connection events for stdout.

use pilight_link::ConnectionEvent;

/// How events are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One human-readable line per event.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Renders `event` as a single line without the trailing newline.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(event: &ConnectionEvent, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(event.to_string()),
        OutputFormat::Json => serde_json::to_string(event),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
