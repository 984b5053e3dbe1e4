//! Error types for Tessera Core.

use thiserror::Error;

use crate::types::RecordId;

/// Core errors that can occur during record operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("record id mismatch: stored under {expected}, content hashes to {actual}")]
    IdMismatch { expected: RecordId, actual: RecordId },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for record structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("signature present without a public key")]
    SignatureWithoutKey,

    #[error("comment must reference a parent")]
    MissingParent,

    #[error("{0} must not reference a parent")]
    UnexpectedParent(&'static str),

    #[error("message must carry a recipient bucket")]
    MissingRecipient,

    #[error("{field} is {len} bytes, maximum is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("timestamp {0} is outside the supported range")]
    TimestampOutOfRange(i64),
}
