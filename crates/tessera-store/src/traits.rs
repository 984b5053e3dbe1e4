//! Store traits: the abstract interface to the replicated graph and the
//! local settings blob store.
//!
//! The graph guarantees only eventual consistency and at-least-once
//! delivery. Callers must tolerate missing, duplicated, and reordered data.

use async_trait::async_trait;
use bytes::Bytes;
use tessera_core::Blake3Hash;

use crate::error::Result;
use crate::subscription::Subscription;

/// Result of writing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    /// Key was new.
    Inserted,
    /// Key already held identical bytes (idempotent - not an error).
    AlreadyExists,
    /// Key held different bytes and was overwritten.
    Replaced,
}

/// Result of adding a member to a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResult {
    /// The store-assigned member key.
    pub key: String,
    /// False if the member was already present.
    pub inserted: bool,
}

/// One member of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub key: String,
    pub value: Bytes,
}

impl Member {
    pub fn new(value: impl Into<Bytes>) -> Self {
        let value = value.into();
        Self {
            key: member_key(&value),
            value,
        }
    }
}

/// Member keys are content-derived, so adding the same value twice is a
/// no-op on every backend.
pub fn member_key(value: &[u8]) -> String {
    Blake3Hash::hash(value).to_hex()
}

/// The replicated graph: keyed nodes plus append-only member sets.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Node Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the node at `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write the node at `key`.
    async fn put(&self, key: &str, value: &[u8]) -> Result<PutResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Collection Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `value` to `collection`. Idempotent.
    async fn set(&self, collection: &str, value: &[u8]) -> Result<SetResult>;

    /// One-shot scan of the current members, in insertion order.
    async fn members(&self, collection: &str) -> Result<Vec<Member>>;

    /// Stream the current members, then every member added later.
    ///
    /// The stream ends only when the store is closed.
    async fn subscribe(&self, collection: &str) -> Result<Subscription>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Tear down: end all subscriptions and refuse further operations.
    async fn close(&self) -> Result<()>;
}

/// Durable local storage for named blobs (the settings file).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_blob(&self, name: &str) -> Result<Option<Bytes>>;

    async fn put_blob(&self, name: &str, value: &[u8]) -> Result<()>;
}
