//! Record feeds over member sets.
//!
//! Collections hold record ids. A feed resolves each id to its node,
//! decodes it, and checks it before delivery. An item that fails any check
//! is logged, counted in [`FeedStats`], and skipped; the feed itself never
//! fails.
//!
//! Replication may deliver a member before the node it names. Such members
//! wait in a pending queue and are retried until the node shows up or
//! [`FeedConfig::missing_record_grace`] runs out.

use std::collections::VecDeque;
use std::str;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use tessera_core::{
    decode_record, validate_record_structure, verify, FeedStats, FeedStatsSnapshot, Record,
    RecordId, RecordKind,
};
use tessera_store::{keys, GraphStore, Member, Subscription};

use crate::config::FeedConfig;
use crate::error::Result;

/// A standing, deduplicated stream of verified records.
pub struct Feed<T> {
    subscription: Subscription,
    store: Arc<dyn GraphStore>,
    kind: RecordKind,
    require_signature: bool,
    grace: Duration,
    retry_interval: Duration,
    pending: VecDeque<Pending>,
    ready: VecDeque<T>,
    stats: Arc<FeedStats>,
    map: fn(Record) -> T,
}

/// A member whose record node was not available yet.
struct Pending {
    member: Member,
    since: Instant,
}

enum Rejected {
    /// Node absent or unreadable; may still arrive.
    Missing,
    Parse,
    Crypto,
}

impl<T> Feed<T> {
    pub(crate) async fn open(
        store: Arc<dyn GraphStore>,
        collection: &str,
        kind: RecordKind,
        config: &FeedConfig,
        map: fn(Record) -> T,
    ) -> Result<Self> {
        let stats = Arc::new(FeedStats::new());
        let subscription = store.subscribe(collection).await?.with_stats(stats.clone());
        Ok(Self {
            subscription,
            store,
            kind,
            require_signature: config.require_signature,
            grace: config.missing_record_grace,
            retry_interval: config.retry_interval,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            stats,
            map,
        })
    }

    /// Next valid item. `None` once the store has closed.
    ///
    /// While records are pending, waits at most one retry interval for new
    /// members before retrying them.
    pub async fn next(&mut self) -> Option<T> {
        let mut retry = true;
        loop {
            if retry {
                self.retry_pending().await;
                retry = false;
            }
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }

            let member = if self.pending.is_empty() {
                self.subscription.next().await?
            } else {
                tokio::select! {
                    member = self.subscription.next() => member?,
                    _ = tokio::time::sleep(self.retry_interval) => {
                        retry = true;
                        continue;
                    }
                }
            };
            self.accept(member, Instant::now()).await;
        }
    }

    /// Every valid item available without waiting for new members.
    /// Pending records are retried first.
    pub async fn drain(&mut self) -> Vec<T> {
        self.retry_pending().await;
        while let Some(member) = self.subscription.try_next().await {
            self.accept(member, Instant::now()).await;
        }
        self.ready.drain(..).collect()
    }

    pub fn collection(&self) -> &str {
        self.subscription.collection()
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }

    /// Members still waiting for their record node.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn retry_pending(&mut self) {
        for _ in 0..self.pending.len() {
            let Some(Pending { member, since }) = self.pending.pop_front() else {
                break;
            };
            self.accept(member, since).await;
        }
    }

    async fn accept(&mut self, member: Member, since: Instant) {
        match self.load(&member).await {
            Ok(record) => {
                self.stats.record_delivered();
                self.ready.push_back((self.map)(record));
            }
            Err(Rejected::Missing) if since.elapsed() < self.grace => {
                self.pending.push_back(Pending { member, since });
            }
            Err(Rejected::Missing) => {
                warn!(
                    collection = self.subscription.collection(),
                    member = %member.key,
                    "record never became available"
                );
                self.stats.record_parse_error();
            }
            Err(Rejected::Parse) => self.stats.record_parse_error(),
            Err(Rejected::Crypto) => self.stats.record_crypto_error(),
        }
    }

    async fn load(&self, member: &Member) -> std::result::Result<Record, Rejected> {
        let collection = self.subscription.collection();
        let id = str::from_utf8(&member.value)
            .ok()
            .and_then(|s| RecordId::from_hex(s.trim()).ok())
            .ok_or_else(|| {
                warn!(collection, member = %member.key, "member is not a record id");
                Rejected::Parse
            })?;

        let Some(key) = keys::record_key(self.kind, &id) else {
            return Err(Rejected::Parse);
        };
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(collection, %id, "record not available yet");
                return Err(Rejected::Missing);
            }
            Err(e) => {
                debug!(collection, %id, error = %e, "record fetch failed");
                return Err(Rejected::Missing);
            }
        };

        let record = decode_record(&bytes).map_err(|e| {
            warn!(collection, %id, error = %e, "undecodable record");
            Rejected::Parse
        })?;
        if record.kind != self.kind {
            warn!(collection, %id, kind = record.kind.as_str(), "record of the wrong kind");
            return Err(Rejected::Parse);
        }
        if let Err(e) = validate_record_structure(&record) {
            warn!(collection, %id, error = %e, "structurally invalid record");
            return Err(Rejected::Parse);
        }
        if record.id() != id {
            warn!(collection, %id, actual = %record.id(), "record does not hash to its key");
            return Err(Rejected::Crypto);
        }
        if !verify(&record) {
            warn!(collection, %id, "record signature invalid");
            return Err(Rejected::Crypto);
        }
        if self.require_signature && !record.is_signed() {
            return Err(Rejected::Crypto);
        }
        Ok(record)
    }
}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("collection", &self.subscription.collection())
            .field("kind", &self.kind)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
