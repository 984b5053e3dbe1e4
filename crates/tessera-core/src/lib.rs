//! # Tessera Core
//!
//! Pure primitives for Tessera: records, canonicalization, content addressing,
//! and signatures.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over the record data model shared by every peer.
//!
//! ## Key Types
//!
//! - [`Record`] - A post, comment, or message; immutable once written
//! - [`RecordId`] - Content-addressed identifier (Blake3 of canonical bytes)
//! - [`BucketId`] - Mailbox routing label derived from an encryption key
//! - [`Keypair`] - Ed25519 signing identity
//!
//! ## Canonicalization
//!
//! Records are encoded using deterministic CBOR with text keys. See the
//! [`canonical`] module. The id of a record is the digest of that encoding,
//! so two peers holding the same record always agree on its id.

#[macro_use]
mod macros;

pub mod canonical;
pub mod crypto;
pub mod eligibility;
pub mod error;
pub mod record;
pub mod stats;
pub mod types;
pub mod validation;

pub use canonical::{canonical_bytes, decode_record, signed_message};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use eligibility::{eligibility, is_eligible, Eligibility, EPOCH, LEGACY_ANSWER_LEN};
pub use error::{CoreError, ValidationError};
pub use record::{day_bucket, now_secs, Captcha, Record, RecordBuilder, RecordKind, DAY_SECS};
pub use stats::{FeedStats, FeedStatsSnapshot};
pub use types::{BucketId, RecordId};
pub use validation::{validate_record, validate_record_structure, verify, MAX_TIMESTAMP};
