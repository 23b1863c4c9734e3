//! Reconciliation
//!
//! Compares the materialized key/value state of two endpoints. Every call
//! fetches every value on both sides, so the cost grows with the total key
//! count; it is meant for periodic checks.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::keyset::{self, IgnoreSet};
use crate::store::{printable, KvStore};

/// A key with the value it held when read
pub type Pair = (Bytes, Bytes);

/// Pairs present on only one side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Divergence {
    pub src_only: Vec<Pair>,
    pub dst_only: Vec<Pair>,
}

impl Divergence {
    pub fn is_empty(&self) -> bool {
        self.src_only.is_empty() && self.dst_only.is_empty()
    }
}

/// Key-count comparison of two endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub in_sync: bool,
    pub src_keys: usize,
    pub dst_keys: usize,
}

impl SyncStatus {
    /// Status line, e.g. `sync: OK!! => src: 3 dst: 3`
    pub fn render(&self, color: bool) -> String {
        let status = match (self.in_sync, color) {
            (true, true) => "\x1b[32mOK!!\x1b[0m",
            (true, false) => "OK!!",
            (false, true) => "\x1b[31mNG!!\x1b[0m",
            (false, false) => "NG!!",
        };
        format!("sync: {} => src: {} dst: {}", status, self.src_keys, self.dst_keys)
    }
}

/// Read every non-ignored key's value, sorted by (key, value).
///
/// Keys that disappear between listing and reading are left out, and so
/// are keys whose value cannot be read as a string.
pub async fn materialize<S: KvStore>(store: &mut S, ignore: &IgnoreSet) -> Result<Vec<Pair>> {
    let keys = keyset::list(store, ignore).await?;
    let mut pairs = Vec::with_capacity(keys.len());
    for key in keys {
        match store.get(&key).await {
            Ok(Some(value)) => pairs.push((key, value)),
            Ok(None) => {}
            Err(Error::Server(reason)) => {
                tracing::warn!("unreadable => key: {}, error: {}", printable(&key), reason);
            }
            Err(e) => return Err(e),
        }
    }
    pairs.sort();
    Ok(pairs)
}

/// Whether both endpoints hold exactly the same key/value pairs
pub async fn equal<S, D>(src: &mut S, dst: &mut D, ignore: &IgnoreSet) -> Result<bool>
where
    S: KvStore,
    D: KvStore,
{
    let s = materialize(src, ignore).await?;
    let d = materialize(dst, ignore).await?;
    Ok(s == d)
}

/// Symmetric difference of both endpoints' key/value pairs
pub async fn diff<S, D>(src: &mut S, dst: &mut D, ignore: &IgnoreSet) -> Result<Divergence>
where
    S: KvStore,
    D: KvStore,
{
    let s = materialize(src, ignore).await?;
    let d = materialize(dst, ignore).await?;
    Ok(divergence(s, d))
}

fn divergence(s: Vec<Pair>, d: Vec<Pair>) -> Divergence {
    let in_src: HashSet<&Pair> = s.iter().collect();
    let in_dst: HashSet<&Pair> = d.iter().collect();

    let src_only = s.iter().filter(|p| !in_dst.contains(p)).cloned().collect();
    let dst_only = d.iter().filter(|p| !in_src.contains(p)).cloned().collect();

    Divergence { src_only, dst_only }
}

/// Compare the key sets (not values) of both endpoints
pub async fn sync_status<S, D>(src: &mut S, dst: &mut D, ignore: &IgnoreSet) -> Result<SyncStatus>
where
    S: KvStore,
    D: KvStore,
{
    let mut s = keyset::list(src, ignore).await?;
    let mut d = keyset::list(dst, ignore).await?;
    s.sort();
    d.sort();

    Ok(SyncStatus {
        in_sync: s == d,
        src_keys: s.len(),
        dst_keys: d.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WrongTypeStore};

    async fn store_with(pairs: &[(&str, &str)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (key, value) in pairs {
            store.set(key.as_bytes(), value.as_bytes()).await.unwrap();
        }
        store
    }

    fn pair(key: &str, value: &str) -> Pair {
        (
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
        )
    }

    #[tokio::test]
    async fn test_identical_stores() {
        let mut src = store_with(&[("a", "1"), ("b", "2")]).await;
        let mut dst = store_with(&[("b", "2"), ("a", "1")]).await;
        let ignore = IgnoreSet::default();

        assert!(equal(&mut src, &mut dst, &ignore).await.unwrap());
        let divergence = diff(&mut src, &mut dst, &ignore).await.unwrap();
        assert!(divergence.src_only.is_empty());
        assert!(divergence.dst_only.is_empty());
    }

    #[tokio::test]
    async fn test_symmetric_difference() {
        let mut src = store_with(&[("a", "1"), ("b", "2"), ("c", "3")]).await;
        let mut dst = store_with(&[("a", "1"), ("b", "changed"), ("d", "4")]).await;
        let ignore = IgnoreSet::default();

        assert!(!equal(&mut src, &mut dst, &ignore).await.unwrap());
        let divergence = diff(&mut src, &mut dst, &ignore).await.unwrap();
        assert_eq!(divergence.src_only, vec![pair("b", "2"), pair("c", "3")]);
        assert_eq!(divergence.dst_only, vec![pair("b", "changed"), pair("d", "4")]);
    }

    #[tokio::test]
    async fn test_ignored_keys_do_not_diverge() {
        let mut src = store_with(&[("a", "1"), ("lock", "src")]).await;
        let mut dst = store_with(&[("a", "1"), ("lock", "dst")]).await;
        let ignore = IgnoreSet::new(["lock"]);

        assert!(equal(&mut src, &mut dst, &ignore).await.unwrap());
        assert!(diff(&mut src, &mut dst, &ignore).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_status_compares_keys_only() {
        let mut src = store_with(&[("a", "1"), ("b", "2")]).await;
        let mut dst = store_with(&[("a", "x"), ("b", "y")]).await;
        let ignore = IgnoreSet::default();

        let status = sync_status(&mut src, &mut dst, &ignore).await.unwrap();
        assert!(status.in_sync);
        assert_eq!(status.render(false), "sync: OK!! => src: 2 dst: 2");

        dst.del(b"b").await.unwrap();
        let status = sync_status(&mut src, &mut dst, &ignore).await.unwrap();
        assert!(!status.in_sync);
        assert_eq!(status.render(false), "sync: NG!! => src: 2 dst: 1");
        assert!(status.render(true).contains("\x1b[31mNG!!\x1b[0m"));
    }

    #[tokio::test]
    async fn test_wrongtype_key_is_left_out() {
        let inner = store_with(&[("a", "1"), ("b", "2")]).await;
        let mut src = WrongTypeStore::new(inner, b"queue");
        let mut dst = store_with(&[("a", "1"), ("b", "2")]).await;
        let ignore = IgnoreSet::default();

        let pairs = materialize(&mut src, &ignore).await.unwrap();
        assert_eq!(pairs, vec![pair("a", "1"), pair("b", "2")]);
        assert!(equal(&mut src, &mut dst, &ignore).await.unwrap());
        assert!(diff(&mut src, &mut dst, &ignore).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_binary_keys_diverge_exactly() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.set(b"k\xff", b"1").await.unwrap();
        dst.set(b"k\xfe", b"1").await.unwrap();

        let divergence = diff(&mut src, &mut dst, &IgnoreSet::default()).await.unwrap();
        assert_eq!(divergence.src_only[0].0, Bytes::from_static(b"k\xff"));
        assert_eq!(divergence.dst_only[0].0, Bytes::from_static(b"k\xfe"));
    }
}
