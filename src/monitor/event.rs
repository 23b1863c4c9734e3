//! MONITOR Event Types
//!
//! Tokenizes one raw MONITOR line into an event. A typical line is
//! `1339518083.107412 [0 127.0.0.1:60866] "SET" "foo" "bar"`: a timestamp
//! id, a two-token client descriptor, the command name and its arguments.

use std::borrow::Cow;

use serde::Serialize;

/// A decoded MONITOR line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Line with an unusable token count (0, 2 or 3)
    Empty,
    /// Single-token line, e.g. the `OK` that acknowledges MONITOR
    Bare { token: String },
    /// Command with no key argument
    Command {
        id: String,
        source: String,
        command: String,
    },
    /// Command against a key
    Keyed {
        id: String,
        source: String,
        command: String,
        key: String,
        /// Inline arguments after the key (informational only)
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl MonitorEvent {
    /// Command name, if the line carried one
    pub fn command(&self) -> Option<&str> {
        match self {
            MonitorEvent::Command { command, .. } | MonitorEvent::Keyed { command, .. } => {
                Some(command.as_str())
            }
            _ => None,
        }
    }

    /// Key argument, if the line carried one
    pub fn key(&self) -> Option<&str> {
        match self {
            MonitorEvent::Keyed { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }

    /// Database index from the `[db addr]` client descriptor, when present
    pub fn db(&self) -> Option<u32> {
        let source = match self {
            MonitorEvent::Command { source, .. } | MonitorEvent::Keyed { source, .. } => source,
            _ => return None,
        };
        source
            .strip_prefix('[')?
            .split_ascii_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// Same event with the inline value dropped
    pub fn without_value(self) -> Self {
        match self {
            MonitorEvent::Keyed {
                id,
                source,
                command,
                key,
                ..
            } => MonitorEvent::Keyed {
                id,
                source,
                command,
                key,
                value: None,
            },
            other => other,
        }
    }
}

/// Parse a raw MONITOR line. Never fails: malformed lines become
/// [`MonitorEvent::Empty`].
pub fn parse_line(raw: &[u8]) -> MonitorEvent {
    let line = normalize(raw);
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();

    match tokens.len() {
        1 => MonitorEvent::Bare {
            token: tokens[0].to_string(),
        },
        4 => MonitorEvent::Command {
            id: tokens[0].to_string(),
            source: format!("{} {}", tokens[1], tokens[2]),
            command: unquote(tokens[3]).to_string(),
        },
        5 => MonitorEvent::Keyed {
            id: tokens[0].to_string(),
            source: format!("{} {}", tokens[1], tokens[2]),
            command: unquote(tokens[3]).to_string(),
            key: unquote(tokens[4]).to_string(),
            value: None,
        },
        n if n >= 6 => {
            // The last token is a trailing artifact and is not part of the value
            let value = tokens[5..n - 1].join(" ");
            MonitorEvent::Keyed {
                id: tokens[0].to_string(),
                source: format!("{} {}", tokens[1], tokens[2]),
                command: unquote(tokens[3]).to_string(),
                key: unquote(tokens[4]).to_string(),
                value: Some(unquote(&value).to_string()),
            }
        }
        _ => MonitorEvent::Empty,
    }
}

/// Replace every invalid UTF-8 sequence with a single `?`
pub fn normalize(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(line) => Cow::Borrowed(line),
        Err(_) => {
            let mut out = String::with_capacity(raw.len());
            for chunk in raw.utf8_chunks() {
                out.push_str(chunk.valid());
                if !chunk.invalid().is_empty() {
                    out.push('?');
                }
            }
            Cow::Owned(out)
        }
    }
}

/// Strip one layer of surrounding double quotes
fn unquote(token: &str) -> &str {
    let token = token.strip_prefix('"').unwrap_or(token);
    token.strip_suffix('"').unwrap_or(token)
}
