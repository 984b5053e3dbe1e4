//! In-memory implementation of the store traits.
//!
//! This is primarily for testing and single-process boards. It has the same
//! semantics as SQLite but keeps everything in memory with no persistence.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{poisoned, Result, StoreError};
use crate::subscription::{Hub, Rescan, Subscription, DEFAULT_CAPACITY};
use crate::traits::{BlobStore, GraphStore, Member, PutResult, SetResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    /// Graph nodes by key.
    nodes: HashMap<String, Bytes>,

    /// Collections, in insertion order.
    sets: HashMap<String, MemberSet>,

    /// Settings blobs by name.
    blobs: HashMap<String, Bytes>,

    hub: Hub,

    closed: bool,
}

#[derive(Default)]
struct MemberSet {
    members: Vec<Member>,
    keys: HashSet<String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store whose subscriptions buffer `capacity` live members.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                nodes: HashMap::new(),
                sets: HashMap::new(),
                blobs: HashMap::new(),
                hub: Hub::new(capacity),
                closed: false,
            })),
        }
    }

    /// Number of nodes stored.
    pub fn node_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.nodes.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn members(&self, collection: &str) -> Vec<Member> {
        self.sets
            .get(collection)
            .map(|s| s.members.clone())
            .unwrap_or_default()
    }
}

fn rescan(inner: &Arc<RwLock<MemoryStoreInner>>, collection: &str) -> Rescan {
    let inner = inner.clone();
    let collection = collection.to_string();
    Arc::new(move || {
        let members = inner.read().map_err(poisoned).and_then(|inner| {
            inner.ensure_open()?;
            Ok(inner.members(&collection))
        });
        Box::pin(futures::future::ready(members))
    })
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner.ensure_open()?;
        Ok(inner.nodes.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<PutResult> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.ensure_open()?;

        let result = match inner.nodes.get(key) {
            Some(existing) if existing.as_ref() == value => return Ok(PutResult::AlreadyExists),
            Some(_) => PutResult::Replaced,
            None => PutResult::Inserted,
        };
        inner.nodes.insert(key.to_string(), Bytes::copy_from_slice(value));
        debug!(key, ?result, "put node");
        Ok(result)
    }

    async fn set(&self, collection: &str, value: &[u8]) -> Result<SetResult> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.ensure_open()?;

        let member = Member::new(Bytes::copy_from_slice(value));
        let set = inner.sets.entry(collection.to_string()).or_default();
        if !set.keys.insert(member.key.clone()) {
            return Ok(SetResult {
                key: member.key,
                inserted: false,
            });
        }
        set.members.push(member.clone());
        inner.hub.publish(collection, &member);
        debug!(collection, key = %member.key, "added member");

        Ok(SetResult {
            key: member.key,
            inserted: true,
        })
    }

    async fn members(&self, collection: &str) -> Result<Vec<Member>> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner.ensure_open()?;
        Ok(inner.members(collection))
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription> {
        // Receiver and snapshot under one write lock: nothing can slip between.
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.ensure_open()?;
        let live = inner.hub.receiver(collection);
        let snapshot = inner.members(collection);
        Ok(Subscription::new(collection, snapshot, live)
            .with_rescan(rescan(&self.inner, collection)))
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.closed = true;
        inner.hub.close();
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get_blob(&self, name: &str) -> Result<Option<Bytes>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.blobs.get(name).cloned())
    }

    async fn put_blob(&self, name: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .blobs
            .insert(name.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        assert_eq!(store.put("k", b"v").await.unwrap(), PutResult::Inserted);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_idempotent() {
        let store = MemoryStore::new();

        store.put("k", b"v").await.unwrap();
        assert_eq!(store.put("k", b"v").await.unwrap(), PutResult::AlreadyExists);
        assert_eq!(store.put("k", b"w").await.unwrap(), PutResult::Replaced);

        let first = store.set("c", b"m").await.unwrap();
        let second = store.set("c", b"m").await.unwrap();
        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.key, second.key);
        assert_eq!(store.members("c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_members_preserve_insertion_order() {
        let store = MemoryStore::new();
        for v in ["3", "1", "2"] {
            store.set("c", v.as_bytes()).await.unwrap();
        }
        let values: Vec<_> = store
            .members("c")
            .await
            .unwrap()
            .into_iter()
            .map(|m| String::from_utf8(m.value.to_vec()).unwrap())
            .collect();
        assert_eq!(values, vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_subscription_sees_snapshot_then_live() {
        let store = MemoryStore::new();
        store.set("c", b"old").await.unwrap();

        let mut sub = store.subscribe("c").await.unwrap();
        store.set("c", b"new").await.unwrap();
        store.set("c", b"new").await.unwrap();

        assert_eq!(sub.next().await.unwrap().value.as_ref(), b"old");
        assert_eq!(sub.next().await.unwrap().value.as_ref(), b"new");
        assert!(sub.try_next().await.is_none());

        store.close().await.unwrap();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscription_misses_nothing() {
        let store = MemoryStore::with_capacity(1);
        let mut sub = store.subscribe("c").await.unwrap();
        for v in ["a", "b", "c"] {
            store.set("c", v.as_bytes()).await.unwrap();
        }

        let mut got = Vec::new();
        while let Some(member) = sub.try_next().await {
            got.push(String::from_utf8(member.value.to_vec()).unwrap());
        }
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_closed_store_refuses_operations() {
        let store = MemoryStore::new();
        store.close().await.unwrap();
        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
        assert!(matches!(store.subscribe("c").await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get_blob("settings").await.unwrap().is_none());
        store.put_blob("settings", b"{}").await.unwrap();
        assert_eq!(
            store.get_blob("settings").await.unwrap().as_deref(),
            Some(&b"{}"[..])
        );
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_set_is_idempotent(values in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..16), 0..20)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let store = MemoryStore::new();
                let members = rt.block_on(async {
                    for v in values.iter().chain(values.iter()) {
                        store.set("c", v).await.unwrap();
                    }
                    store.members("c").await.unwrap()
                });

                let distinct: std::collections::HashSet<_> = values.iter().collect();
                prop_assert_eq!(members.len(), distinct.len());
            }
        }
    }
}
