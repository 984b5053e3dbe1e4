//! Standing subscriptions over collections.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use tessera_core::FeedStats;

use crate::error::Result;
use crate::traits::Member;

/// Default per-collection broadcast buffer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of newly added members to live subscribers.
///
/// One broadcast channel per collection, created on first subscribe.
/// Dropping the hub's senders ends every subscription.
#[derive(Debug)]
pub struct Hub {
    capacity: usize,
    senders: HashMap<String, broadcast::Sender<Member>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: HashMap::new(),
        }
    }

    /// Obtain a receiver for `collection`.
    pub fn receiver(&mut self, collection: &str) -> broadcast::Receiver<Member> {
        let capacity = self.capacity;
        self.senders
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe()
    }

    /// Announce a new member to live subscribers, if any.
    pub fn publish(&mut self, collection: &str, member: &Member) {
        if let Some(tx) = self.senders.get(collection) {
            if tx.send(member.clone()).is_err() {
                // No receivers left.
                self.senders.remove(collection);
            }
        }
    }

    /// Drop every sender.
    pub fn close(&mut self) {
        debug!(collections = self.senders.len(), "closing subscription hub");
        self.senders.clear();
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Re-reads a collection from the store after the live receiver lagged.
pub type Rescan = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<Member>>> + Send + Sync>;

/// A stream of collection members: the snapshot taken at subscribe time,
/// followed by live additions.
///
/// Members are deduplicated by key, so overlap between the snapshot and the
/// live feed (or an at-least-once redelivery) yields each member once. When
/// the live receiver falls behind its buffer, the collection is rescanned
/// and every member not yet yielded is queued again.
pub struct Subscription {
    collection: String,
    backlog: VecDeque<Member>,
    live: Option<broadcast::Receiver<Member>>,
    seen: HashSet<String>,
    stats: Option<Arc<FeedStats>>,
    rescan: Option<Rescan>,
    behind: bool,
}

impl Subscription {
    /// The live receiver must be obtained before the snapshot is read so
    /// that nothing added in between is missed.
    pub fn new(
        collection: impl Into<String>,
        snapshot: Vec<Member>,
        live: broadcast::Receiver<Member>,
    ) -> Self {
        Self {
            collection: collection.into(),
            backlog: snapshot.into(),
            live: Some(live),
            seen: HashSet::new(),
            stats: None,
            rescan: None,
            behind: false,
        }
    }

    /// Recover from lag by calling `rescan`. Without one, lagged members
    /// are lost.
    pub fn with_rescan(mut self, rescan: Rescan) -> Self {
        self.rescan = Some(rescan);
        self
    }

    /// Count suppressed duplicates into `stats`.
    pub fn with_stats(mut self, stats: Arc<FeedStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next unseen member. `None` once the store has closed.
    ///
    /// Cancel-safe: a rescan interrupted midway is redone on the next call.
    pub async fn next(&mut self) -> Option<Member> {
        loop {
            if self.behind {
                self.catch_up().await;
            }
            if let Some(member) = self.pop_backlog() {
                return Some(member);
            }

            let live = self.live.as_mut()?;
            match live.recv().await {
                Ok(member) => {
                    if self.first_sighting(&member) {
                        return Some(member);
                    }
                }
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => {
                    debug!(collection = %self.collection, "subscription closed");
                    self.live = None;
                    return None;
                }
            }
        }
    }

    /// Next unseen member if one is available without waiting for new
    /// additions. Only a rescan after lag is awaited.
    pub async fn try_next(&mut self) -> Option<Member> {
        loop {
            if self.behind {
                self.catch_up().await;
            }
            if let Some(member) = self.pop_backlog() {
                return Some(member);
            }

            let live = self.live.as_mut()?;
            match live.try_recv() {
                Ok(member) => {
                    if self.first_sighting(&member) {
                        return Some(member);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.live = None;
                    return None;
                }
            }
        }
    }

    /// Whether the live side has ended.
    pub fn is_closed(&self) -> bool {
        self.live.is_none() && self.backlog.is_empty()
    }

    fn pop_backlog(&mut self) -> Option<Member> {
        while let Some(member) = self.backlog.pop_front() {
            if self.first_sighting(&member) {
                return Some(member);
            }
        }
        None
    }

    fn lagged(&mut self, skipped: u64) {
        warn!(collection = %self.collection, skipped, "subscription lagged");
        self.behind = self.rescan.is_some();
    }

    async fn catch_up(&mut self) {
        let Some(rescan) = self.rescan.clone() else {
            self.behind = false;
            return;
        };
        match rescan().await {
            Ok(members) => {
                let seen = &self.seen;
                let missed: Vec<Member> =
                    members.into_iter().filter(|m| !seen.contains(&m.key)).collect();
                debug!(collection = %self.collection, missed = missed.len(), "rescanned collection");
                self.backlog.extend(missed);
                self.behind = false;
            }
            Err(e) => {
                // Stays behind; retried on the next call.
                warn!(collection = %self.collection, error = %e, "rescan failed");
            }
        }
    }

    fn first_sighting(&mut self, member: &Member) -> bool {
        if self.seen.insert(member.key.clone()) {
            return true;
        }
        if let Some(stats) = &self.stats {
            stats.record_duplicate();
        }
        false
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .field("backlog", &self.backlog.len())
            .field("closed", &self.live.is_none())
            .field("behind", &self.behind)
            .finish()
    }
}
