//! Test store in which one listed key holds a non-string value.
//!
//! Reads of that key fail the way a hash or list does under `GET`.

use bytes::Bytes;

use super::{Expiry, KvStore, MemoryStore};
use crate::error::{Error, Result};

pub(crate) struct WrongTypeStore {
    inner: MemoryStore,
    key: Bytes,
}

impl WrongTypeStore {
    pub(crate) fn new(inner: MemoryStore, key: &'static [u8]) -> Self {
        Self {
            inner,
            key: Bytes::from_static(key),
        }
    }

    fn check(&self, key: &[u8]) -> Result<()> {
        if key == &self.key[..] {
            return Err(Error::Server(
                "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvStore for WrongTypeStore {
    async fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn setex(&mut self, key: &[u8], value: &[u8], seconds: u64) -> Result<()> {
        self.inner.setex(key, value, seconds).await
    }

    async fn psetex(&mut self, key: &[u8], value: &[u8], millis: u64) -> Result<()> {
        self.inner.psetex(key, value, millis).await
    }

    async fn ttl(&mut self, key: &[u8]) -> Result<Expiry> {
        if key == &self.key[..] {
            return Ok(Expiry::Persistent);
        }
        self.inner.ttl(key).await
    }

    async fn pttl(&mut self, key: &[u8]) -> Result<Expiry> {
        if key == &self.key[..] {
            return Ok(Expiry::Persistent);
        }
        self.inner.pttl(key).await
    }

    async fn del(&mut self, key: &[u8]) -> Result<bool> {
        self.inner.del(key).await
    }

    async fn keys(&mut self) -> Result<Vec<Bytes>> {
        let mut keys = self.inner.keys().await?;
        keys.push(self.key.clone());
        Ok(keys)
    }
}
