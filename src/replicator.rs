//! Live Replication
//!
//! Tails the source's notification stream and mirrors every recognized
//! write onto the destination. Values are never taken from the stream;
//! each update re-reads the key's current value and TTL from the source,
//! so the destination converges to the source's state at apply time.

use bytes::Bytes;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::keyset::IgnoreSet;
use crate::migrate::{copy_key, CopyOutcome};
use crate::monitor::{event_to_operation, parse_line, MonitorEvent, Operation};
use crate::store::{printable, KvStore, NotificationStream, TtlUnit};

/// Lifecycle of a replicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatorState {
    /// Created, not yet consuming
    Idle,
    /// Consuming the stream
    Tailing,
    /// Stream ended or failed; cannot be restarted
    Stopped,
}

/// Counters for one replication run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplicationSummary {
    /// Lines read from the stream
    pub lines: u64,
    /// Updates that wrote to the destination
    pub updates: u64,
    /// Deletes issued on the destination
    pub deletes: u64,
    /// Operations on ignored keys, or updates whose key was already gone
    pub skipped: u64,
    /// Lines for a database other than the source's
    pub other_db: u64,
    /// Updates the server refused, e.g. a key holding a non-string value
    pub failed: u64,
}

/// Result of applying one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Updated(CopyOutcome),
    Deleted,
    Ignored,
    Rejected,
    Nothing,
}

/// Applies decoded operations from the source onto the destination
pub struct LiveReplicator<S, D> {
    /// Source handle for value/TTL reads (not the tailing connection)
    reader: S,
    writer: D,
    ignore: IgnoreSet,
    /// MONITOR reports every database; only this one is mirrored
    source_db: Option<u32>,
    state: ReplicatorState,
}

impl<S, D> LiveReplicator<S, D>
where
    S: KvStore,
    D: KvStore,
{
    pub fn new(reader: S, writer: D, ignore: IgnoreSet) -> Self {
        Self {
            reader,
            writer,
            ignore,
            source_db: None,
            state: ReplicatorState::Idle,
        }
    }

    /// Drop lines whose `[db addr]` descriptor names another database.
    /// Lines without a descriptor are still applied.
    pub fn with_source_db(mut self, db: u32) -> Self {
        self.source_db = Some(db);
        self
    }

    pub fn state(&self) -> ReplicatorState {
        self.state
    }

    /// Consume the stream until it ends.
    ///
    /// Lines are applied strictly in arrival order. Any store error stops
    /// replication and is returned.
    pub async fn run(&mut self, mut stream: NotificationStream) -> Result<ReplicationSummary> {
        if self.state != ReplicatorState::Idle {
            return Err(Error::Internal(format!(
                "replicator cannot start from state {:?}",
                self.state
            )));
        }

        self.state = ReplicatorState::Tailing;
        tracing::info!("Live replication started");

        let mut summary = ReplicationSummary::default();
        let result = self.tail(&mut stream, &mut summary).await;
        self.state = ReplicatorState::Stopped;

        match result {
            Ok(()) => {
                tracing::info!(
                    "Live replication stopped: {} lines, {} updates, {} deletes, {} skipped, {} failed",
                    summary.lines,
                    summary.updates,
                    summary.deletes,
                    summary.skipped,
                    summary.failed
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Live replication failed after {} lines: {}", summary.lines, e);
                Err(e)
            }
        }
    }

    async fn tail(
        &mut self,
        stream: &mut NotificationStream,
        summary: &mut ReplicationSummary,
    ) -> Result<()> {
        while let Some(line) = stream.next().await {
            let line: Bytes = line?;
            summary.lines += 1;

            let event = parse_line(&line);
            if let (Some(wanted), Some(db)) = (self.source_db, event.db()) {
                if db != wanted {
                    summary.other_db += 1;
                    continue;
                }
            }

            match self.apply(event_to_operation(&event)).await? {
                Applied::Updated(outcome) if outcome.is_written() => summary.updates += 1,
                Applied::Updated(_) | Applied::Ignored => summary.skipped += 1,
                Applied::Deleted => summary.deletes += 1,
                Applied::Rejected => summary.failed += 1,
                Applied::Nothing => {}
            }
        }
        Ok(())
    }

    /// Apply a single operation
    pub async fn apply(&mut self, op: Operation) -> Result<Applied> {
        if let Some(key) = op.key() {
            if self.ignore.contains(key) {
                tracing::debug!("ignore => key: {}", printable(key));
                return Ok(Applied::Ignored);
            }
        }

        match op {
            Operation::Update { key } => self.update(&key, TtlUnit::Seconds).await,
            Operation::UpdateMillis { key } => self.update(&key, TtlUnit::Millis).await,
            Operation::Delete { key } => {
                self.writer.del(&key).await?;
                tracing::info!("delete => key: {}", printable(&key));
                Ok(Applied::Deleted)
            }
            Operation::Unclassified => Ok(Applied::Nothing),
        }
    }

    async fn update(&mut self, key: &[u8], unit: TtlUnit) -> Result<Applied> {
        let outcome = match copy_key(&mut self.reader, &mut self.writer, key, unit).await {
            Ok(outcome) => outcome,
            Err(Error::Server(reason)) => {
                tracing::warn!("fail => key: {}, error: {}", printable(key), reason);
                return Ok(Applied::Rejected);
            }
            Err(e) => return Err(e),
        };

        let key = printable(key);
        if outcome.is_written() {
            tracing::info!("sync => key: {} ttl: {}{}", key, outcome.expiry(), unit.suffix());
        } else {
            tracing::debug!("skip => key: {} ttl: {}{}", key, outcome.expiry(), unit.suffix());
        }
        Ok(Applied::Updated(outcome))
    }
}

/// Read-only observer that logs each decoded MONITOR line as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct Watcher {
    verbose: bool,
}

impl Watcher {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// JSON record for one raw line
    pub fn render(&self, raw: &[u8]) -> Result<String> {
        let event = parse_line(raw);
        let event = if self.verbose {
            event
        } else {
            event.without_value()
        };
        Ok(serde_json::to_string(&event)?)
    }

    /// Log every line until the stream ends; returns the number of lines seen
    pub async fn run(&self, mut stream: NotificationStream) -> Result<u64> {
        let mut lines = 0;
        while let Some(line) = stream.next().await {
            let line = line?;
            lines += 1;
            if matches!(parse_line(&line), MonitorEvent::Empty) {
                continue;
            }
            tracing::info!("{}", self.render(&line)?);
        }
        Ok(lines)
    }
}
