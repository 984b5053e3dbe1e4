//! # Tessera Chain
//!
//! Serverless anti-spam gate for Tessera. Each new post or comment is bound,
//! deterministically, to the captcha challenge of one of its ancestors.
//!
//! ## Key Types
//!
//! - [`Resolver`] - Walks `prev`/`parent` pointers and picks the binding
//! - [`Binding`] - The chosen ancestor and its challenge
//! - [`ChainWalk`] - Everything a walk collected, with the reason it stopped
//! - [`ChallengeGenerator`] - Renders new challenges
//!
//! ## Determinism
//!
//! Given the same stored ancestors, every peer computes the same binding.
//! Missing or untrustworthy ancestors end the chain early rather than
//! failing, unless [`MalformedPolicy::Reject`] is configured.

pub mod challenge;
pub mod config;
pub mod error;
pub mod resolver;

pub use challenge::{Challenge, ChallengeGenerator};
pub use config::{ChallengeConfig, MalformedPolicy, ResolverConfig, FALLBACK_GENESIS};
pub use error::{ChainError, Result};
pub use resolver::{Binding, ChainEnd, ChainWalk, Resolver, ResolverStats, ResolverStatsSnapshot};
