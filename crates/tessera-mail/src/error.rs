//! Error types for the messaging module.

use thiserror::Error;

use tessera_store::StoreError;

/// Errors that can occur during messaging operations.
#[derive(Debug, Error)]
pub enum MailError {
    /// Key material could not be generated, parsed, or exported.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Ciphertext is not valid base64 or not a whole number of blocks.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Plaintext is not UTF-8 JSON of a record.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A blocking crypto task failed to complete.
    #[error("crypto task failed: {0}")]
    Task(String),
}

impl MailError {
    /// Whether this is a content problem rather than a crypto one.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Payload(_))
    }
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MailError>;
