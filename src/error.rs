//! WolfMirror Error Types

use thiserror::Error;

/// Result type alias for WolfMirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfMirror error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Network errors
    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("Authentication failed for {address}: {reason}")]
    AuthFailed { address: String, reason: String },

    // Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Notification stream closed")]
    StreamClosed,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify a driver error against the endpoint it came from
    pub fn from_redis(address: &str, err: redis::RedisError) -> Self {
        let reason = err.to_string();
        if err.kind() == redis::ErrorKind::AuthenticationFailed {
            Error::AuthFailed {
                address: address.to_string(),
                reason,
            }
        } else if err.is_timeout() {
            Error::ConnectionTimeout(address.to_string())
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Error::ConnectionFailed {
                address: address.to_string(),
                reason,
            }
        } else if err.kind() == redis::ErrorKind::TypeError {
            Error::Protocol(reason)
        } else {
            Error::Server(reason)
        }
    }

    /// Check if this error means an endpoint could not be reached or talked to
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::AuthFailed { .. }
                | Error::StreamClosed
                | Error::Io(_)
        )
    }
}
