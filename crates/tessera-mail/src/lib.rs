//! # Tessera Mail
//!
//! Private messages for Tessera.
//!
//! ## Overview
//!
//! Messages are JSON-serialized records, encrypted with RSA-OAEP(SHA-256)
//! in fixed-size blocks and filed in a mailbox named by the digest of the
//! recipient's public encryption key. Nothing in the graph says who a
//! mailbox belongs to.
//!
//! ## Key Types
//!
//! - [`EncryptionKeypair`] - RSA keys exported as PEM
//! - [`Mailbox`] - Sends to both parties' buckets, opens inboxes
//! - [`Inbox`] - Standing subscription yielding decrypted, verified records
//!
//! ## Chunking
//!
//! See [`cipher`] for the block layout.

pub mod cipher;
pub mod error;
pub mod keys;
pub mod mailbox;

pub use cipher::{decrypt, decrypt_bytes, encrypt, encrypt_bytes, open_record, seal_record};
pub use error::{MailError, Result};
pub use keys::{
    EncryptionKeypair, EncryptionPrivateKey, EncryptionPublicKey, DEFAULT_MODULUS_BITS,
    MIN_MODULUS_BITS,
};
pub use mailbox::{Delivery, Inbox, Mailbox};
