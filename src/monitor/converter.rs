//! MONITOR Event to Operation Converter
//!
//! Classifies decoded events into the operations the replicator applies.

use bytes::Bytes;

use super::event::MonitorEvent;

/// Replication class of a command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Value written, TTL in seconds
    Update,
    /// Value written, TTL in milliseconds
    UpdateMillis,
    Delete,
    Other,
}

/// Command names (lowercase) that affect replication
const COMMAND_TABLE: &[(&str, CommandKind)] = &[
    ("set", CommandKind::Update),
    ("setex", CommandKind::Update),
    ("getset", CommandKind::Update),
    ("psetex", CommandKind::UpdateMillis),
    ("del", CommandKind::Delete),
];

/// Classify a command name, ignoring case
pub fn classify(command: &str) -> CommandKind {
    let folded = command.to_ascii_lowercase();
    COMMAND_TABLE
        .iter()
        .find(|(name, _)| *name == folded)
        .map(|(_, kind)| *kind)
        .unwrap_or(CommandKind::Other)
}

/// Action to mirror onto the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Re-read value and TTL (seconds) from the source and write them
    Update { key: Bytes },
    /// Re-read value and TTL (milliseconds) from the source and write them
    UpdateMillis { key: Bytes },
    /// Delete from the destination
    Delete { key: Bytes },
    /// Nothing to do
    Unclassified,
}

impl Operation {
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            Operation::Update { key }
            | Operation::UpdateMillis { key }
            | Operation::Delete { key } => Some(key),
            Operation::Unclassified => None,
        }
    }
}

/// Convert a decoded event to an operation
pub fn event_to_operation(event: &MonitorEvent) -> Operation {
    match event {
        MonitorEvent::Keyed { command, key, .. } => {
            let key = unescape(key);
            match classify(command) {
                CommandKind::Update => Operation::Update { key },
                CommandKind::UpdateMillis => Operation::UpdateMillis { key },
                CommandKind::Delete => Operation::Delete { key },
                CommandKind::Other => Operation::Unclassified,
            }
        }

        // No key to act on
        MonitorEvent::Command { .. } => Operation::Unclassified,
        MonitorEvent::Bare { .. } => Operation::Unclassified,
        MonitorEvent::Empty => Operation::Unclassified,
    }
}

/// Undo MONITOR's argument escaping (`\\`, `\"`, `\n`, `\r`, `\t`, `\a`,
/// `\b`, `\xHH`) to recover the exact key bytes
pub fn unescape(token: &str) -> Bytes {
    let raw = token.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 == raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }

        let escaped = match raw[i + 1] {
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'a' => Some(0x07),
            b'b' => Some(0x08),
            b'\\' => Some(b'\\'),
            b'"' => Some(b'"'),
            _ => None,
        };
        if let Some(b) = escaped {
            out.push(b);
            i += 2;
            continue;
        }

        let hex = raw
            .get(i + 2..i + 4)
            .filter(|digits| raw[i + 1] == b'x' && digits.iter().all(u8::is_ascii_hexdigit))
            .and_then(|digits| std::str::from_utf8(digits).ok())
            .and_then(|digits| u8::from_str_radix(digits, 16).ok());
        match hex {
            Some(b) => {
                out.push(b);
                i += 4;
            }
            None => {
                out.push(raw[i]);
                i += 1;
            }
        }
    }

    Bytes::from(out)
}
