//! Mirror Facade
//!
//! Bundles a source handle, a destination handle and the ignore list, and
//! exposes every one-shot mode (listing, migration, reconciliation,
//! cleanup) over them. Live replication and watch mode need their own
//! tailing connection and are opened with [`open_replication`] and
//! [`open_watch`].

use std::fmt;

use bytes::Bytes;

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::keyset::{self, IgnoreSet};
use crate::migrate::{self, MigrationReport};
use crate::reconcile::{self, Divergence, SyncStatus};
use crate::replicator::LiveReplicator;
use crate::seed;
use crate::store::{Expiry, KvStore, NotificationSource, NotificationStream, RedisStore};

/// Which side of the mirror an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Endpoint {
    #[value(name = "src")]
    Source,
    #[value(name = "dst")]
    Destination,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Source => write!(f, "src"),
            Endpoint::Destination => write!(f, "dst"),
        }
    }
}

/// Source and destination handles plus the keys to leave alone
pub struct Mirror<S, D> {
    src: S,
    dst: D,
    ignore: IgnoreSet,
}

impl Mirror<RedisStore, RedisStore> {
    /// Connect to both configured endpoints
    pub async fn connect(config: &MirrorConfig) -> Result<Self> {
        let src = RedisStore::connect(&config.src).await?;
        tracing::debug!("Connected to src {}", src.address());
        let dst = RedisStore::connect(&config.dst).await?;
        tracing::debug!("Connected to dst {}", dst.address());

        Ok(Self::new(src, dst, IgnoreSet::new(&config.option.ignore_key)))
    }
}

impl<S, D> Mirror<S, D>
where
    S: KvStore,
    D: KvStore,
{
    pub fn new(src: S, dst: D, ignore: IgnoreSet) -> Self {
        Self { src, dst, ignore }
    }

    pub fn into_parts(self) -> (S, D, IgnoreSet) {
        (self.src, self.dst, self.ignore)
    }

    /// Non-ignored keys of one endpoint, sorted
    pub async fn keys(&mut self, endpoint: Endpoint) -> Result<Vec<Bytes>> {
        let mut keys = match endpoint {
            Endpoint::Source => keyset::list(&mut self.src, &self.ignore).await?,
            Endpoint::Destination => keyset::list(&mut self.dst, &self.ignore).await?,
        };
        keys.sort();
        Ok(keys)
    }

    pub async fn key_count(&mut self, endpoint: Endpoint) -> Result<usize> {
        Ok(self.keys(endpoint).await?.len())
    }

    /// Remaining TTL of every non-ignored key of one endpoint, sorted by key
    pub async fn ttls(&mut self, endpoint: Endpoint) -> Result<Vec<(Bytes, Expiry)>> {
        let mut ttls = match endpoint {
            Endpoint::Source => migrate::ttls(&mut self.src, &self.ignore).await?,
            Endpoint::Destination => migrate::ttls(&mut self.dst, &self.ignore).await?,
        };
        ttls.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ttls)
    }

    /// Copy every source key to the destination
    pub async fn migrate(&mut self) -> Result<MigrationReport> {
        migrate::migrate_all(&mut self.src, &mut self.dst, &self.ignore).await
    }

    /// Delete every non-ignored key of one endpoint
    pub async fn purge(&mut self, endpoint: Endpoint) -> Result<usize> {
        tracing::warn!("Purging all keys on {}", endpoint);
        match endpoint {
            Endpoint::Source => migrate::purge(&mut self.src, &self.ignore).await,
            Endpoint::Destination => migrate::purge(&mut self.dst, &self.ignore).await,
        }
    }

    pub async fn equal(&mut self) -> Result<bool> {
        reconcile::equal(&mut self.src, &mut self.dst, &self.ignore).await
    }

    pub async fn diff(&mut self) -> Result<Divergence> {
        reconcile::diff(&mut self.src, &mut self.dst, &self.ignore).await
    }

    pub async fn sync_status(&mut self) -> Result<SyncStatus> {
        reconcile::sync_status(&mut self.src, &mut self.dst, &self.ignore).await
    }

    /// Write random expiring keys to the source
    pub async fn seed(&mut self, count: usize) -> Result<Vec<String>> {
        seed::seed(&mut self.src, count).await
    }
}

/// Open the tailing connection plus fresh read/write handles for live
/// replication. The replicator only applies lines for the source's db.
pub async fn open_replication(
    config: &MirrorConfig,
) -> Result<(NotificationStream, LiveReplicator<RedisStore, RedisStore>)> {
    let tail = RedisStore::connect(&config.src).await?;
    tracing::info!("Tailing {}", tail.address());
    let stream = tail.monitor().await?;

    let mirror = Mirror::connect(config).await?;
    let (reader, writer, ignore) = mirror.into_parts();
    let replicator = LiveReplicator::new(reader, writer, ignore).with_source_db(config.src.db);
    Ok((stream, replicator))
}

/// Open a tailing connection to the source for watch mode
pub async fn open_watch(config: &MirrorConfig) -> Result<NotificationStream> {
    let tail = RedisStore::connect(&config.src).await?;
    tracing::info!("Watching {}", tail.address());
    tail.monitor().await
}
