//! Logging infrastructure for rustue
//!
//! Tracing bootstrap plus the PDU logging used by every layer. Per-layer
//! verbosity comes in as an env-filter expression built from the
//! [`LogLevel`] values in `LogConfig`; PDU payloads are dumped at trace
//! level, bounded by the configured hex limit.

use std::fmt;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Log level configuration for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose, includes payload dumps
    Trace,
    /// Debug level - per-PDU and state-change events
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl fmt::Display for LogLevel {
    // rendered exactly as the env-filter syntax expects
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Initialize logging with an env-filter expression.
///
/// Called once at startup with the expression built by
/// `LogConfig::filter_string`; the `RUST_LOG` environment variable takes
/// precedence when set. Thread names are included so consumer-thread
/// events (`stack`) are distinguishable from worker ones (`bg-0`, ...).
///
/// # Example
///
/// ```
/// use rustue_common::logging::init_logging_with_filter;
///
/// // Set default to info, but enable debug for the RRC layer
/// init_logging_with_filter("info,rustue_stack::layers::rrc=debug");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::NONE)
        .init();
}

/// Protocol direction for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Incoming/received message
    Rx,
    /// Outgoing/transmitted message
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// Log a protocol PDU at debug level with a bounded hex dump at trace
/// level.
///
/// # Arguments
///
/// * `layer` - Layer name (e.g., "MAC", "RLC", "PDCP", "RRC", "NAS")
/// * `direction` - Message direction (RX or TX)
/// * `lcid` - Logical channel the PDU belongs to
/// * `data` - Raw PDU bytes
/// * `hex_limit` - Maximum number of bytes included in the trace dump
pub fn log_pdu(layer: &str, direction: Direction, lcid: u32, data: &[u8], hex_limit: usize) {
    tracing::debug!(
        layer = layer,
        direction = %direction,
        lcid = lcid,
        len = data.len(),
        "{} {} PDU",
        direction,
        layer
    );
    tracing::trace!(
        layer = layer,
        pdu = %format_pdu_hex(data, hex_limit),
        "{} payload",
        layer
    );
}

/// Format a PDU as space-separated groups of four hex bytes, truncated to
/// `limit` bytes with the full length noted.
pub fn format_pdu_hex(data: &[u8], limit: usize) -> String {
    if data.is_empty() {
        return String::from("(empty)");
    }

    let shown = &data[..data.len().min(limit)];
    let mut out = shown
        .chunks(4)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > shown.len() {
        out.push_str(&format!(" ..[{} bytes total]", data.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display_matches_filter_syntax() {
        let rendered: Vec<String> = [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(rendered, ["trace", "debug", "info", "warn", "error"]);
    }

    #[test]
    fn test_log_level_yaml_roundtrip() {
        let level: LogLevel = serde_yaml::from_str("debug").unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(serde_yaml::to_string(&level).unwrap().trim(), "debug");
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Rx.to_string(), "RX");
        assert_eq!(Direction::Tx.to_string(), "TX");
    }

    #[test]
    fn test_pdu_hex_empty() {
        assert_eq!(format_pdu_hex(&[], 64), "(empty)");
    }

    #[test]
    fn test_pdu_hex_groups_of_four() {
        let data = [0x07, 0x41, 0x00, 0x01, 0xde, 0xad];
        assert_eq!(format_pdu_hex(&data, 64), "07410001 dead");
    }

    #[test]
    fn test_pdu_hex_truncates_at_limit() {
        let data: Vec<u8> = (0..10).collect();
        let dump = format_pdu_hex(&data, 4);
        assert_eq!(dump, "00010203 ..[10 bytes total]");
    }

    #[test]
    fn test_pdu_hex_exact_limit_not_marked() {
        let data = [0xaa, 0xbb];
        assert_eq!(format_pdu_hex(&data, 2), "aabb");
    }
}
