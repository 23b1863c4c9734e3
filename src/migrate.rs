//! Bulk Migration
//!
//! One pass over the source's keys, copying each value together with its
//! remaining TTL. The per-key copy is the same primitive the live
//! replicator uses.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::keyset::{self, IgnoreSet};
use crate::store::{printable, Expiry, KvStore, TtlUnit};

/// What happened to one key during a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Written without expiration
    Persisted { value: Bytes },
    /// Written with the source's remaining TTL
    Expiring { value: Bytes, ttl: u64 },
    /// Source TTL had already run down to zero; nothing written
    Expired,
    /// Key was gone from the source; nothing written
    Vanished,
}

impl CopyOutcome {
    /// Expiration as read from the source
    pub fn expiry(&self) -> Expiry {
        match self {
            CopyOutcome::Persisted { .. } => Expiry::Persistent,
            CopyOutcome::Expiring { ttl, .. } => Expiry::Remaining(*ttl),
            CopyOutcome::Expired => Expiry::Remaining(0),
            CopyOutcome::Vanished => Expiry::Absent,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, CopyOutcome::Persisted { .. } | CopyOutcome::Expiring { .. })
    }
}

/// Copy one key from `src` to `dst`, preserving its expiration.
///
/// A key that no longer exists on the source is not an error and leaves
/// the destination untouched. A key without expiration is written with a
/// plain `SET`.
pub async fn copy_key<S, D>(src: &mut S, dst: &mut D, key: &[u8], unit: TtlUnit) -> Result<CopyOutcome>
where
    S: KvStore,
    D: KvStore,
{
    let value = src.get(key).await?;
    let expiry = src.expiry(key, unit).await?;

    let value = match (value, expiry) {
        (_, Expiry::Absent) | (None, _) => return Ok(CopyOutcome::Vanished),
        (Some(value), _) => value,
    };

    match expiry {
        Expiry::Persistent => {
            dst.set(key, &value).await?;
            Ok(CopyOutcome::Persisted { value })
        }
        Expiry::Remaining(0) => Ok(CopyOutcome::Expired),
        Expiry::Remaining(ttl) => {
            dst.set_expiring(key, &value, ttl, unit).await?;
            Ok(CopyOutcome::Expiring { value, ttl })
        }
        Expiry::Absent => Ok(CopyOutcome::Vanished),
    }
}

/// Result of a bulk migration
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Keys written to the destination
    pub copied: usize,
    /// Keys that vanished or expired before they could be copied
    pub skipped: usize,
    /// Keys the server refused to read or write, e.g. non-string values
    pub failed: Vec<Bytes>,
    /// Per-key outcome, in copy order
    pub outcomes: Vec<(Bytes, CopyOutcome)>,
}

/// Copy every non-ignored source key to the destination.
///
/// A key the server rejects (`WRONGTYPE` and the like) is logged and left
/// behind; losing an endpoint stops the pass.
pub async fn migrate_all<S, D>(src: &mut S, dst: &mut D, ignore: &IgnoreSet) -> Result<MigrationReport>
where
    S: KvStore,
    D: KvStore,
{
    let keys = keyset::list(src, ignore).await?;
    tracing::info!("Migrating {} keys", keys.len());

    let mut report = MigrationReport::default();
    for key in keys {
        let outcome = match copy_key(src, dst, &key, TtlUnit::Seconds).await {
            Ok(outcome) => outcome,
            Err(Error::Server(reason)) => {
                tracing::warn!("fail => key: {}, error: {}", printable(&key), reason);
                report.failed.push(key);
                continue;
            }
            Err(e) => return Err(e),
        };
        tracing::info!("add => key: {}, ttl: {}", printable(&key), outcome.expiry());

        if outcome.is_written() {
            report.copied += 1;
        } else {
            report.skipped += 1;
        }
        report.outcomes.push((key, outcome));
    }

    tracing::info!(
        "Migration finished: {} copied, {} skipped, {} failed",
        report.copied,
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}

/// Delete every non-ignored key of a store; returns how many existed
pub async fn purge<S: KvStore>(store: &mut S, ignore: &IgnoreSet) -> Result<usize> {
    let mut removed = 0;
    for key in keyset::list(store, ignore).await? {
        if store.del(&key).await? {
            removed += 1;
        }
        tracing::info!("delete => key: {}", printable(&key));
    }
    Ok(removed)
}

/// Remaining TTL of every non-ignored key
pub async fn ttls<S: KvStore>(store: &mut S, ignore: &IgnoreSet) -> Result<Vec<(Bytes, Expiry)>> {
    let mut result = Vec::new();
    for key in keyset::list(store, ignore).await? {
        let expiry = store.ttl(&key).await?;
        result.push((key, expiry));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WrongTypeStore};

    #[tokio::test]
    async fn test_persistent_key_stays_persistent() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.set(b"a", b"1").await.unwrap();

        let report = migrate_all(&mut src, &mut dst, &IgnoreSet::default()).await.unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(dst.get(b"a").await.unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(dst.ttl(b"a").await.unwrap(), Expiry::Persistent);
        assert_eq!(report.outcomes[0].1.expiry(), Expiry::Persistent);
    }

    #[tokio::test]
    async fn test_expiring_key_keeps_ttl() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.setex(b"session", b"x", 120).await.unwrap();

        let outcome = copy_key(&mut src, &mut dst, b"session", TtlUnit::Seconds).await.unwrap();
        assert!(matches!(outcome, CopyOutcome::Expiring { ttl, .. } if ttl == 120 || ttl == 119));
        match dst.ttl(b"session").await.unwrap() {
            Expiry::Remaining(ttl) => assert!((118..=120).contains(&ttl)),
            other => panic!("unexpected expiry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_millisecond_copy() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.psetex(b"flash", b"x", 5_000).await.unwrap();

        let outcome = copy_key(&mut src, &mut dst, b"flash", TtlUnit::Millis).await.unwrap();
        assert!(outcome.is_written());
        match dst.pttl(b"flash").await.unwrap() {
            Expiry::Remaining(ms) => assert!(ms > 4_000 && ms <= 5_000),
            other => panic!("unexpected expiry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_absent_key_is_noop() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        dst.set(b"ghost", b"old").await.unwrap();

        let outcome = copy_key(&mut src, &mut dst, b"ghost", TtlUnit::Seconds).await.unwrap();
        assert_eq!(outcome, CopyOutcome::Vanished);
        assert_eq!(outcome.expiry(), Expiry::Absent);
        assert_eq!(dst.get(b"ghost").await.unwrap(), Some(Bytes::from_static(b"old")));
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.set(b"a", b"1").await.unwrap();
        src.set(b"b", b"2").await.unwrap();
        src.setex(b"c", b"3", 600).await.unwrap();

        let ignore = IgnoreSet::default();
        migrate_all(&mut src, &mut dst, &ignore).await.unwrap();
        let mut first: Vec<_> = dst.keys().await.unwrap();
        first.sort();

        let again = migrate_all(&mut src, &mut dst, &ignore).await.unwrap();
        let mut second: Vec<_> = dst.keys().await.unwrap();
        second.sort();

        assert_eq!(first, second);
        assert_eq!(again.copied, 3);
        assert_eq!(dst.get(b"c").await.unwrap(), Some(Bytes::from_static(b"3")));
        assert_eq!(dst.ttl(b"a").await.unwrap(), Expiry::Persistent);
    }

    #[tokio::test]
    async fn test_ignored_keys_are_not_migrated() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.set(b"keep", b"1").await.unwrap();
        src.set(b"skip", b"2").await.unwrap();

        migrate_all(&mut src, &mut dst, &IgnoreSet::new(["skip"])).await.unwrap();
        assert_eq!(dst.keys().await.unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_purge_spares_ignored_keys() {
        let mut store = MemoryStore::new();
        store.set(b"a", b"1").await.unwrap();
        store.set(b"b", b"2").await.unwrap();
        store.set(b"keep", b"3").await.unwrap();

        let removed = purge(&mut store, &IgnoreSet::new(["keep"])).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.keys().await.unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_ttls() {
        let mut store = MemoryStore::new();
        store.set(b"a", b"1").await.unwrap();

        let listed = ttls(&mut store, &IgnoreSet::default()).await.unwrap();
        assert_eq!(listed, vec![(Bytes::from_static(b"a"), Expiry::Persistent)]);
    }

    #[tokio::test]
    async fn test_binary_key_is_copied_exactly() {
        let mut src = MemoryStore::new();
        let mut dst = MemoryStore::new();
        src.set(b"k\xff", b"v").await.unwrap();

        let report = migrate_all(&mut src, &mut dst, &IgnoreSet::default()).await.unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(dst.get(b"k\xff").await.unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(dst.keys().await.unwrap(), vec![Bytes::from_static(b"k\xff")]);
    }

    #[tokio::test]
    async fn test_wrongtype_key_does_not_abort_migration() {
        let mut inner = MemoryStore::new();
        inner.set(b"a", b"1").await.unwrap();
        inner.set(b"b", b"2").await.unwrap();
        let mut src = WrongTypeStore::new(inner, b"hash");
        let mut dst = MemoryStore::new();

        let report = migrate_all(&mut src, &mut dst, &IgnoreSet::default()).await.unwrap();
        assert_eq!(report.copied, 2);
        assert_eq!(report.failed, vec![Bytes::from_static(b"hash")]);
        assert_eq!(dst.get(b"b").await.unwrap(), Some(Bytes::from_static(b"2")));
        assert_eq!(dst.get(b"hash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connectivity_error_aborts_migration() {
        let mut src = MemoryStore::new();
        src.set(b"a", b"1").await.unwrap();
        let mut dst = Unreachable;

        let err = migrate_all(&mut src, &mut dst, &IgnoreSet::default()).await.unwrap_err();
        assert!(err.is_connectivity());
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl KvStore for Unreachable {
        async fn get(&mut self, _key: &[u8]) -> Result<Option<Bytes>> {
            Err(down())
        }
        async fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
            Err(down())
        }
        async fn setex(&mut self, _key: &[u8], _value: &[u8], _seconds: u64) -> Result<()> {
            Err(down())
        }
        async fn psetex(&mut self, _key: &[u8], _value: &[u8], _millis: u64) -> Result<()> {
            Err(down())
        }
        async fn ttl(&mut self, _key: &[u8]) -> Result<Expiry> {
            Err(down())
        }
        async fn pttl(&mut self, _key: &[u8]) -> Result<Expiry> {
            Err(down())
        }
        async fn del(&mut self, _key: &[u8]) -> Result<bool> {
            Err(down())
        }
        async fn keys(&mut self) -> Result<Vec<Bytes>> {
            Err(down())
        }
    }

    fn down() -> Error {
        Error::ConnectionFailed {
            address: "127.0.0.1:6380".into(),
            reason: "connection reset".into(),
        }
    }
}
