//! In-Process Store
//!
//! A cloneable key-value store with real expiry deadlines and a
//! MONITOR-style notification feed. Clones share state, so one clone can
//! be tailed while others read and write. [`MemoryStore::database`] opens
//! another database of the same server: its own keys, the same feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{Expiry, KvStore, NotificationSource, NotificationStream};
use crate::error::{Error, Result};

/// Notifications buffered per subscriber
const FEED_CAPACITY: usize = 4096;

struct Entry {
    value: Bytes,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |deadline| deadline > now)
    }
}

type Feed = Arc<Mutex<Option<broadcast::Sender<Bytes>>>>;

/// In-process endpoint handle
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<Bytes, Entry>>>,
    feed: Feed,
    db: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store (database 0)
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            feed: Arc::new(Mutex::new(Some(tx))),
            db: 0,
        }
    }

    /// An empty database `db` on the same server, sharing this store's feed
    pub fn database(&self, db: u32) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            feed: Arc::clone(&self.feed),
            db,
        }
    }

    /// Publish a raw line on the notification feed
    pub fn publish(&self, line: impl Into<Bytes>) {
        if let Ok(feed) = self.feed.lock() {
            if let Some(tx) = feed.as_ref() {
                // No subscribers is fine
                let _ = tx.send(line.into());
            }
        }
    }

    /// End the notification feed; subscribers drain what is buffered and stop
    pub fn close_notifications(&self) {
        if let Ok(mut feed) = self.feed.lock() {
            feed.take();
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Bytes, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))
    }

    fn notify(&self, args: &[&[u8]]) {
        let now = chrono::Utc::now();
        let mut line = format!(
            "{}.{:06} [{} memory]",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            self.db
        );
        for arg in args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        self.publish(line);
    }

    fn write(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: Bytes::copy_from_slice(value),
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.lock()?.insert(Bytes::copy_from_slice(key), entry);
        Ok(())
    }

    fn remaining(&self, key: &[u8]) -> Result<Option<Option<Duration>>> {
        let now = Instant::now();
        let entries = self.lock()?;
        Ok(entries.get(key).filter(|e| e.is_live(now)).map(|e| {
            e.deadline.map(|deadline| deadline.saturating_duration_since(now))
        }))
    }
}

/// Quote an argument the way MONITOR prints it: printable ASCII as is,
/// `\\` and `\"` escaped, everything else as `\xHH`
fn quote(arg: &[u8]) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for &b in arg {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('"');
    out
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        let now = Instant::now();
        let entries = self.lock()?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(key, value, None)?;
        self.notify(&["SET".as_bytes(), key, value]);
        Ok(())
    }

    async fn setex(&mut self, key: &[u8], value: &[u8], seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(Error::Server("ERR invalid expire time in 'setex' command".into()));
        }
        self.write(key, value, Some(Duration::from_secs(seconds)))?;
        let ttl = seconds.to_string();
        self.notify(&["SETEX".as_bytes(), key, ttl.as_bytes(), value]);
        Ok(())
    }

    async fn psetex(&mut self, key: &[u8], value: &[u8], millis: u64) -> Result<()> {
        if millis == 0 {
            return Err(Error::Server("ERR invalid expire time in 'psetex' command".into()));
        }
        self.write(key, value, Some(Duration::from_millis(millis)))?;
        let ttl = millis.to_string();
        self.notify(&["PSETEX".as_bytes(), key, ttl.as_bytes(), value]);
        Ok(())
    }

    async fn ttl(&mut self, key: &[u8]) -> Result<Expiry> {
        // Rounded to the nearest second like TTL
        Ok(match self.remaining(key)? {
            None => Expiry::Absent,
            Some(None) => Expiry::Persistent,
            Some(Some(left)) => Expiry::Remaining(((left.as_millis() + 500) / 1000) as u64),
        })
    }

    async fn pttl(&mut self, key: &[u8]) -> Result<Expiry> {
        Ok(match self.remaining(key)? {
            None => Expiry::Absent,
            Some(None) => Expiry::Persistent,
            Some(Some(left)) => Expiry::Remaining(left.as_millis() as u64),
        })
    }

    async fn del(&mut self, key: &[u8]) -> Result<bool> {
        let now = Instant::now();
        let existed = self
            .lock()?
            .remove(key)
            .map_or(false, |entry| entry.is_live(now));
        self.notify(&["DEL".as_bytes(), key]);
        Ok(existed)
    }

    async fn keys(&mut self) -> Result<Vec<Bytes>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        entries.retain(|_, e| e.is_live(now));
        Ok(entries.keys().cloned().collect())
    }
}

#[async_trait::async_trait]
impl NotificationSource for MemoryStore {
    async fn monitor(self) -> Result<NotificationStream> {
        let rx = {
            let feed = self
                .feed
                .lock()
                .map_err(|_| Error::Internal("memory store lock poisoned".into()))?;
            feed.as_ref().ok_or(Error::StreamClosed)?.subscribe()
        };

        let stream = BroadcastStream::new(rx).map(|item| {
            item.map_err(|e| Error::Internal(format!("notification feed: {}", e)))
        });
        Ok(Box::pin(stream))
    }
}
