//! WolfMirror - Redis Source/Destination Mirroring
//!
//! Keeps a destination Redis in step with a source Redis. Three ways of
//! getting there are offered:
//!
//! - Bulk migration of every key with its remaining TTL
//! - Live replication by tailing the source's `MONITOR` feed and re-reading
//!   each written key from the source
//! - Reconciliation checks that report whether, and where, the two diverge
//!
//! A configurable ignore list keeps selected keys out of every path.
//!
//! # Architecture
//!
//! Endpoints sit behind the [`store::KvStore`] trait, implemented on the
//! `redis` driver for real servers and by an in-process store for tests. MONITOR
//! lines are decoded by [`monitor`] into operations that
//! [`replicator::LiveReplicator`] applies one at a time, in arrival order.

pub mod config;
pub mod error;
pub mod store;
pub mod monitor;
pub mod keyset;
pub mod migrate;
pub mod reconcile;
pub mod replicator;
pub mod seed;
pub mod mirror;

pub use config::MirrorConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::MirrorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::keyset::IgnoreSet;
    pub use crate::mirror::{Endpoint, Mirror};
    pub use crate::monitor::{MonitorEvent, Operation};
    pub use crate::replicator::{LiveReplicator, ReplicationSummary, Watcher};
    pub use crate::store::{Expiry, KvStore, MemoryStore, NotificationSource, RedisStore};
}
