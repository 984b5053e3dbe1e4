//! # Tessera
//!
//! A pseudonymous discussion board with no server: posts, comments, and
//! private messages over an untrusted, eventually-consistent graph store.
//!
//! ## Overview
//!
//! - **Content addressing**: every record is keyed by the digest of its
//!   canonical encoding, so duplicates collapse and tampering shows
//! - **Captcha chains**: each post is bound to the challenge of one of its
//!   ancestors, chosen by its own id, with no arbiter
//! - **Identities**: Ed25519 signing keys and RSA encryption keys kept in a
//!   local settings blob
//! - **Messages**: RSA-encrypted records filed under the digest of the
//!   recipient's key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::{Board, BoardConfig};
//! use tessera::core::RecordBuilder;
//! use tessera::store::SqliteStore;
//!
//! async fn example() -> tessera::Result<()> {
//!     let store = Arc::new(SqliteStore::open("board.db")?);
//!     let board = Board::open(store.clone(), store, BoardConfig::default()).await?;
//!
//!     let me = board.identities().await?.remove(0);
//!     let challenge = board.gen_captcha();
//!     let post = RecordBuilder::post("hello", "first post")
//!         .captcha(challenge.answer, challenge.image)
//!         .build();
//!     let id = board.submit_post(post, Some(&me)).await?;
//!
//!     if let Some(post) = board.load_post(&id).await? {
//!         let binding = board.load_captcha(&post).await?;
//!         println!("bound to {:?}", binding.map(|b| b.source));
//!     }
//!     board.shutdown().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tessera::core` - records, ids, signatures
//! - `tessera::store` - graph and blob store traits and backends
//! - `tessera::chain` - captcha chain resolution
//! - `tessera::mail` - encryption keys and mailboxes

pub mod addressing;
pub mod board;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod settings;
pub mod telemetry;

pub use tessera_chain as chain;
pub use tessera_core as core;
pub use tessera_mail as mail;
pub use tessera_store as store;

pub use addressing::{ParentRef, Submission, Submitter};
pub use board::{Board, RichPost};
pub use config::{BoardConfig, FeedConfig, IdentityConfig, SettingsConfig};
pub use error::{BoardError, Result, SettingsError};
pub use feed::Feed;
pub use identity::{Identity, StoredIdentity};
pub use settings::{Settings, SettingsHandle};
pub use telemetry::init_tracing;

pub use tessera_chain::{Binding, Challenge};
pub use tessera_core::{Record, RecordBuilder, RecordId, RecordKind};
pub use tessera_mail::{EncryptionPublicKey, Inbox};
