//! Error types for chain resolution.

use thiserror::Error;

use tessera_store::StoreError;

/// Errors that can occur while resolving a captcha chain.
///
/// A chain that simply ends is not an error; see
/// [`ChainEnd`](crate::resolver::ChainEnd).
#[derive(Debug, Error)]
pub enum ChainError {
    /// The graph store failed. Not retried.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An ancestor could not be trusted and the resolver runs in strict mode.
    #[error("malformed ancestor at {key}: {reason}")]
    Malformed { key: String, reason: String },
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
