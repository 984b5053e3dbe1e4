//! Captcha chain resolution.
//!
//! Every post is bound to the challenge of one of its ancestors. The
//! ancestor is chosen by the post's own id, so every peer holding the same
//! ancestors picks the same one without coordinating.
//!
//! ## Algorithm
//!
//! 1. `n` is the value of the id's trailing hex pair (0-255).
//! 2. Walk backward along `prev`, collecting eligible ancestors. Stop after
//!    `n` steps, at a missing pointer, or at the first ineligible ancestor.
//! 3. A comment without `prev` starts from its thread root instead: follow
//!    `parent` through comments to the owning post and take that post as the
//!    first candidate. A root at or before the epoch is swapped for the
//!    fallback genesis post, whose `prev` the walk continues from.
//! 4. An empty chain means no binding. Otherwise the binding is
//!    `chain[n % chain.len()]`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use tessera_core::{
    decode_record, eligibility, verify, Captcha, Eligibility, Record, RecordId, EPOCH,
};
use tessera_store::{keys, GraphStore};

use crate::config::{MalformedPolicy, ResolverConfig};
use crate::error::{ChainError, Result};

/// The challenge a post is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The post being resolved.
    pub post: RecordId,
    /// The ancestor whose challenge applies.
    pub source: RecordId,
    /// Position of `source` in the collected chain.
    pub index: usize,
    pub challenge: Captcha,
    pub chain_len: usize,
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// `n` ancestors were collected.
    Exhausted,
    /// The last record had no pointer to follow.
    NoPointer,
    /// A pointer referenced a record the store does not hold (yet).
    Missing,
    /// An ancestor failed the eligibility predicate.
    Ineligible(Eligibility),
    /// An ancestor failed to decode, hash to its key, or verify.
    Malformed,
    /// A pointer led back to an already visited record.
    Cycle,
    /// The thread-root walk exceeded its hop bound.
    DepthLimit,
}

/// The full outcome of a walk, including the collected chain.
#[derive(Debug, Clone)]
pub struct ChainWalk {
    pub selector: u8,
    /// Collected ancestors, nearest first.
    pub chain: Vec<(RecordId, Record)>,
    pub end: ChainEnd,
}

impl ChainWalk {
    /// Pick the binding from the collected chain.
    pub fn binding(&self, post: RecordId) -> Option<Binding> {
        if self.chain.is_empty() {
            return None;
        }
        let index = self.selector as usize % self.chain.len();
        let (source, record) = &self.chain[index];
        // Eligible ancestors always carry a captcha.
        let challenge = record.captcha.clone()?;
        Some(Binding {
            post,
            source: *source,
            index,
            challenge,
            chain_len: self.chain.len(),
        })
    }
}

/// Resolution counters.
#[derive(Debug, Default)]
pub struct ResolverStats {
    resolutions: AtomicU64,
    bindings: AtomicU64,
    malformed: AtomicU64,
    cycles: AtomicU64,
}

/// Point-in-time copy of [`ResolverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStatsSnapshot {
    pub resolutions: u64,
    pub bindings: u64,
    pub malformed: u64,
    pub cycles: u64,
}

impl ResolverStats {
    pub fn snapshot(&self) -> ResolverStatsSnapshot {
        ResolverStatsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            bindings: self.bindings.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of fetching one ancestor.
enum Fetched {
    Found(Record),
    Absent,
    Malformed(String),
}

/// Outcome of one lookup that may end the walk.
enum Step<T> {
    Continue(T),
    End(ChainEnd),
}

/// Resolves posts to the challenge they are bound to.
///
/// Independent resolutions may run concurrently; each walk is sequential.
pub struct Resolver {
    store: Arc<dyn GraphStore>,
    config: ResolverConfig,
    stats: ResolverStats,
}

impl Resolver {
    pub fn new(store: Arc<dyn GraphStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            config,
            stats: ResolverStats::default(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn stats(&self) -> ResolverStatsSnapshot {
        self.stats.snapshot()
    }

    /// Find the challenge `record` is bound to.
    ///
    /// `Ok(None)` means no binding applies; that is a normal outcome.
    pub async fn resolve(&self, record: &Record) -> Result<Option<Binding>> {
        let id = record.id();
        let walk = self.walk(record).await?;
        let binding = walk.binding(id);

        self.stats.resolutions.fetch_add(1, Ordering::Relaxed);
        if binding.is_some() {
            self.stats.bindings.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            post = %id,
            chain_len = walk.chain.len(),
            end = ?walk.end,
            index = ?binding.as_ref().map(|b| b.index),
            "resolved captcha chain"
        );
        Ok(binding)
    }

    /// Walk the chain behind `record` and report what was collected.
    pub async fn walk(&self, record: &Record) -> Result<ChainWalk> {
        let id = record.id();
        let n = id.selector();
        let mut walk = ChainWalk {
            selector: n,
            chain: Vec::new(),
            end: ChainEnd::Exhausted,
        };
        let mut remaining = n as usize;
        let mut visited = HashSet::from([id]);

        if remaining == 0 {
            return Ok(walk);
        }

        let mut cursor = match (record.prev, record.parent) {
            (None, Some(parent)) => match self.thread_root(parent).await? {
                Step::End(end) => {
                    walk.end = end;
                    return Ok(walk);
                }
                Step::Continue((root_id, root)) if root.timestamp <= EPOCH => {
                    debug!(root = %root_id, "thread root predates epoch, using fallback genesis");
                    match self.fallback_prev(&mut visited).await? {
                        Step::Continue(prev) => prev,
                        Step::End(end) => {
                            walk.end = end;
                            return Ok(walk);
                        }
                    }
                }
                Step::Continue((root_id, root)) => {
                    if !visited.insert(root_id) {
                        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                        walk.end = ChainEnd::Cycle;
                        return Ok(walk);
                    }
                    let verdict = eligibility(&root);
                    if !verdict.is_eligible() {
                        walk.end = ChainEnd::Ineligible(verdict);
                        return Ok(walk);
                    }
                    let prev = root.prev;
                    walk.chain.push((root_id, root));
                    remaining -= 1;
                    prev
                }
            },
            (prev, _) => prev,
        };

        loop {
            if remaining == 0 {
                walk.end = ChainEnd::Exhausted;
                break;
            }
            let Some(next) = cursor else {
                walk.end = ChainEnd::NoPointer;
                break;
            };
            if !visited.insert(next) {
                self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                walk.end = ChainEnd::Cycle;
                break;
            }

            let key = keys::post_key(&next);
            let ancestor = match self.fetch(&key, &next).await? {
                Fetched::Found(record) => record,
                Fetched::Absent => {
                    walk.end = ChainEnd::Missing;
                    break;
                }
                Fetched::Malformed(reason) => {
                    walk.end = self.malformed(key, reason)?;
                    break;
                }
            };

            let verdict = eligibility(&ancestor);
            if !verdict.is_eligible() {
                walk.end = ChainEnd::Ineligible(verdict);
                break;
            }

            cursor = ancestor.prev;
            walk.chain.push((next, ancestor));
            remaining -= 1;
        }

        Ok(walk)
    }

    /// Follow `parent` links from `start` to the owning post.
    async fn thread_root(&self, start: RecordId) -> Result<Step<(RecordId, Record)>> {
        let mut cursor = start;
        let mut visited = HashSet::new();

        for _ in 0..=self.config.max_thread_depth {
            if !visited.insert(cursor) {
                self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                return Ok(Step::End(ChainEnd::Cycle));
            }

            let comment_key = keys::comment_key(&cursor);
            match self.fetch(&comment_key, &cursor).await? {
                Fetched::Found(comment) => match comment.parent {
                    Some(parent) => {
                        cursor = parent;
                        continue;
                    }
                    None => return Ok(Step::End(ChainEnd::NoPointer)),
                },
                Fetched::Malformed(reason) => {
                    return Ok(Step::End(self.malformed(comment_key, reason)?))
                }
                Fetched::Absent => {}
            }

            let post_key = keys::post_key(&cursor);
            return Ok(match self.fetch(&post_key, &cursor).await? {
                Fetched::Found(post) => Step::Continue((cursor, post)),
                Fetched::Absent => Step::End(ChainEnd::Missing),
                Fetched::Malformed(reason) => Step::End(self.malformed(post_key, reason)?),
            });
        }

        debug!(start = %start, "thread root walk hit depth limit");
        Ok(Step::End(ChainEnd::DepthLimit))
    }

    /// The `prev` of the fallback genesis post. The genesis post itself is
    /// never a candidate.
    async fn fallback_prev(
        &self,
        visited: &mut HashSet<RecordId>,
    ) -> Result<Step<Option<RecordId>>> {
        let genesis = self.config.fallback_genesis;
        visited.insert(genesis);
        let key = keys::post_key(&genesis);
        Ok(match self.fetch(&key, &genesis).await? {
            Fetched::Found(post) => Step::Continue(post.prev),
            Fetched::Absent => Step::End(ChainEnd::Missing),
            Fetched::Malformed(reason) => Step::End(self.malformed(key, reason)?),
        })
    }

    /// Read and authenticate the record stored under `key`.
    async fn fetch(&self, key: &str, expected: &RecordId) -> Result<Fetched> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(Fetched::Absent);
        };
        let record = match decode_record(&bytes) {
            Ok(record) => record,
            Err(e) => return Ok(Fetched::Malformed(e.to_string())),
        };
        let actual = record.id();
        if actual != *expected {
            return Ok(Fetched::Malformed(format!("content hashes to {}", actual)));
        }
        if !verify(&record) {
            return Ok(Fetched::Malformed("signature verification failed".into()));
        }
        Ok(Fetched::Found(record))
    }

    fn malformed(&self, key: String, reason: String) -> Result<ChainEnd> {
        self.stats.malformed.fetch_add(1, Ordering::Relaxed);
        warn!(%key, %reason, "malformed ancestor");
        match self.config.on_malformed {
            MalformedPolicy::EndChain => Ok(ChainEnd::Malformed),
            MalformedPolicy::Reject => Err(ChainError::Malformed { key, reason }),
        }
    }
}
