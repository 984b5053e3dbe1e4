//! Error types for the board.

use std::time::Duration;

use thiserror::Error;

use tessera_chain::ChainError;
use tessera_core::{CoreError, RecordId, ValidationError};
use tessera_mail::MailError;
use tessera_store::StoreError;

/// Errors that can occur during board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A stored record could not be decoded or does not match its key.
    #[error("record error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Captcha chain resolution failed (strict mode only).
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Messaging error.
    #[error("messaging error: {0}")]
    Mail(#[from] MailError),

    /// Settings error.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A comment named a different parent than the one it was submitted to.
    #[error("comment parent {claimed} does not match {target}")]
    ParentMismatch { claimed: RecordId, target: RecordId },

    /// The identity has no usable key material.
    #[error("identity error: {0}")]
    Identity(String),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Errors from the settings writer.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A whole-blob replacement was based on an old version.
    #[error("settings version {supplied} is stale, current is {current}")]
    Stale { current: u64, supplied: u64 },

    /// An identity entry holds unusable key material.
    #[error("invalid identity: {0}")]
    Identity(String),

    /// The settings could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key generation for an identity failed.
    #[error("key generation failed: {0}")]
    Keys(#[from] MailError),

    /// The blob store failed.
    #[error("blob store error: {0}")]
    Store(#[from] StoreError),

    /// The blob store did not accept a write in time.
    #[error("settings write timed out after {0:?}")]
    Timeout(Duration),

    /// The settings writer has shut down.
    #[error("settings writer is closed")]
    Closed,
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
