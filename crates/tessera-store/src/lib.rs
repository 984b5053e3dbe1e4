//! # Tessera Store
//!
//! Storage abstraction for Tessera. The board consumes the replicated graph
//! only through the [`GraphStore`] trait and local settings only through
//! [`BlobStore`], so any eventually-consistent backend can sit underneath.
//!
//! ## Key Types
//!
//! - [`GraphStore`] - Keyed nodes plus content-keyed member sets
//! - [`BlobStore`] - Named local blobs (the settings file)
//! - [`Subscription`] - Snapshot-then-live stream of a collection
//! - [`MemoryStore`] - In-memory backend for tests and single processes
//! - [`SqliteStore`] - SQLite-based persistent backend
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tessera_store::{GraphStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("board.db").unwrap();
//!     store.set("posts", b"record bytes").await.unwrap();
//!     let mut sub = store.subscribe("posts").await.unwrap();
//!     while let Some(member) = sub.next().await {
//!         println!("{}", member.key);
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: identical `put`s report `AlreadyExists`; member
//!   keys are content digests, so repeated `set`s add nothing
//! - **Subscriptions dedupe**: at-least-once delivery yields each member once

pub mod error;
pub mod keys;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod subscription;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use subscription::{Hub, Rescan, Subscription};
pub use traits::{member_key, BlobStore, GraphStore, Member, PutResult, SetResult};
