//! Resolver and challenge settings.

use serde::{Deserialize, Serialize};

use tessera_core::RecordId;

/// The post substituted for comment threads whose root predates the epoch.
pub const FALLBACK_GENESIS: [u8; 32] = [
    0x5a, 0x9b, 0x07, 0x6f, 0xb6, 0x0b, 0xe6, 0x70, 0x3c, 0xa9, 0xe6, 0x11, 0x34, 0x2b, 0x89, 0xe8,
    0xd9, 0x86, 0x22, 0x50, 0x9b, 0x30, 0x29, 0x22, 0x66, 0x3d, 0x20, 0xa3, 0x08, 0xc9, 0x99, 0x77,
];

/// What to do with an ancestor that fails to decode, hash, or verify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// The chain ends at the bad ancestor (fail-open).
    #[default]
    EndChain,
    /// Resolution fails with [`ChainError::Malformed`](crate::ChainError::Malformed).
    Reject,
}

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub fallback_genesis: RecordId,
    /// Maximum `parent` hops when looking for a comment's thread root.
    pub max_thread_depth: usize,
    pub on_malformed: MalformedPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_genesis: RecordId::from_bytes(FALLBACK_GENESIS),
            max_thread_depth: 64,
            on_malformed: MalformedPolicy::EndChain,
        }
    }
}

/// Challenge image settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Number of single-pixel noise strokes.
    pub speckles: usize,
    /// Number of full-width noise lines.
    pub lines: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            speckles: 600,
            lines: 6,
        }
    }
}
