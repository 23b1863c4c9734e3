//! Test Data Seeding
//!
//! Fills an endpoint with random expiring keys, for trying out migration
//! and replication against a scratch database.

use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;

use crate::error::Result;
use crate::store::KvStore;

/// Default number of keys written by `seed`
pub const DEFAULT_SEED_COUNT: usize = 100;

const KEY_LEN: usize = 8;
const VALUE_LEN: usize = 16;
const MAX_TTL_SECS: u64 = 99_999;

/// Write `count` random keys, each with a TTL between 1 and 99999 seconds.
/// Returns the generated keys.
pub async fn seed<S: KvStore>(store: &mut S, count: usize) -> Result<Vec<String>> {
    let mut rng = rand::thread_rng();
    let mut written = Vec::with_capacity(count);

    for _ in 0..count {
        let key = Alphanumeric.sample_string(&mut rng, KEY_LEN);
        let value = Alphanumeric.sample_string(&mut rng, VALUE_LEN);
        let ttl = rng.gen_range(1..=MAX_TTL_SECS);

        store.setex(key.as_bytes(), value.as_bytes(), ttl).await?;
        tracing::debug!("seed => key: {}, ttl: {}", key, ttl);
        written.push(key);
    }

    tracing::info!("Seeded {} keys", written.len());
    Ok(written)
}
