//! Store Module
//!
//! The key-value endpoint abstraction used by every mirroring mode, plus
//! the Redis client for real endpoints and an in-process store.

mod client;
mod memory;
#[cfg(test)]
mod wrongtype;

pub use client::RedisStore;
pub use memory::MemoryStore;
#[cfg(test)]
pub(crate) use wrongtype::WrongTypeStore;

use std::borrow::Cow;
use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::{Error, Result};

/// Lazy, non-restartable feed of raw notification lines
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Keys are opaque bytes; this is only for log output
pub fn printable(key: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}

/// Remaining lifetime of a key as reported by `TTL`/`PTTL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// Key exists and never expires (-1)
    Persistent,
    /// Key does not exist (-2)
    Absent,
    /// Key expires after this many seconds or milliseconds
    Remaining(u64),
}

impl Expiry {
    /// Decode the integer reply of `TTL`/`PTTL`
    pub fn from_reply(reply: i64) -> Result<Self> {
        match reply {
            -1 => Ok(Expiry::Persistent),
            -2 => Ok(Expiry::Absent),
            n if n >= 0 => Ok(Expiry::Remaining(n as u64)),
            n => Err(Error::Protocol(format!("unexpected TTL reply {}", n))),
        }
    }

    /// Integer form, using the store's sentinels
    pub fn as_reply(&self) -> i64 {
        match self {
            Expiry::Persistent => -1,
            Expiry::Absent => -2,
            Expiry::Remaining(n) => *n as i64,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_reply())
    }
}

/// Resolution of a TTL read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlUnit {
    Seconds,
    Millis,
}

impl TtlUnit {
    /// Suffix used in progress output
    pub fn suffix(&self) -> &'static str {
        match self {
            TtlUnit::Seconds => "",
            TtlUnit::Millis => "msec",
        }
    }
}

/// Request/response operations against one endpoint.
///
/// Implementations never retry; a failed call surfaces its error to the
/// caller.
#[async_trait::async_trait]
pub trait KvStore: Send {
    /// Current value, `None` when the key does not exist
    async fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Write without expiration
    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Write with an expiration in seconds
    async fn setex(&mut self, key: &[u8], value: &[u8], seconds: u64) -> Result<()>;

    /// Write with an expiration in milliseconds
    async fn psetex(&mut self, key: &[u8], value: &[u8], millis: u64) -> Result<()>;

    async fn ttl(&mut self, key: &[u8]) -> Result<Expiry>;

    async fn pttl(&mut self, key: &[u8]) -> Result<Expiry>;

    /// Delete a key; returns whether it existed
    async fn del(&mut self, key: &[u8]) -> Result<bool>;

    /// Every key of the selected database, in no particular order
    async fn keys(&mut self) -> Result<Vec<Bytes>>;

    /// TTL in the requested unit
    async fn expiry(&mut self, key: &[u8], unit: TtlUnit) -> Result<Expiry> {
        match unit {
            TtlUnit::Seconds => self.ttl(key).await,
            TtlUnit::Millis => self.pttl(key).await,
        }
    }

    /// Expiring write in the requested unit
    async fn set_expiring(
        &mut self,
        key: &[u8],
        value: &[u8],
        ttl: u64,
        unit: TtlUnit,
    ) -> Result<()> {
        match unit {
            TtlUnit::Seconds => self.setex(key, value, ttl).await,
            TtlUnit::Millis => self.psetex(key, value, ttl).await,
        }
    }
}

/// An endpoint that can stream its command notifications.
///
/// Tailing takes over the connection, so the handle is consumed.
#[async_trait::async_trait]
pub trait NotificationSource: Send {
    async fn monitor(self) -> Result<NotificationStream>;
}
