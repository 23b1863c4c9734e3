//! MONITOR Decoding Module
//!
//! Turns raw lines from a Redis `MONITOR` feed into events for watch
//! output and into operations for live replication. Decoding never fails;
//! lines that cannot be understood become no-ops.

mod event;
mod converter;

pub use event::{normalize, parse_line, MonitorEvent};
pub use converter::{classify, event_to_operation, unescape, CommandKind, Operation};

/// Decode a raw line straight to an operation
pub fn decode(raw: &[u8]) -> Operation {
    event_to_operation(&parse_line(raw))
}
