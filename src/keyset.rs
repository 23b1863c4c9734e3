//! Key Set View
//!
//! Enumerates an endpoint's keys with the configured ignore list removed.
//! Keys are raw bytes end to end; nothing here assumes UTF-8.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::Result;
use crate::store::KvStore;

/// Keys excluded from listing, diffing, migration, deletion and replication
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    keys: HashSet<Bytes>,
}

impl IgnoreSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|key| Bytes::copy_from_slice(key.as_ref()))
                .collect(),
        }
    }

    /// Add more keys to ignore
    pub fn extend<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.keys
            .extend(keys.into_iter().map(|key| Bytes::copy_from_slice(key.as_ref())));
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// All keys of a store that are not ignored, in no particular order
pub async fn list<S: KvStore>(store: &mut S, ignore: &IgnoreSet) -> Result<Vec<Bytes>> {
    let keys = store.keys().await?;
    Ok(keys
        .into_iter()
        .filter(|key| !key.is_empty() && !ignore.contains(key))
        .collect())
}
