//! # Tessera Testkit
//!
//! Testing utilities for Tessera.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Canonical vectors**: Records with their expected canonical bytes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for planting chains of records in a store
//!
//! ## Canonical Vectors
//!
//! ```rust
//! use tessera_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tessera_testkit::generators::record;
//!
//! proptest! {
//!     #[test]
//!     fn id_is_deterministic(r in record()) {
//!         prop_assert_eq!(r.id(), r.clone().id());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use tessera_testkit::fixtures::{captcha_post, with_selector, AFTER_EPOCH};
//!
//! let post = with_selector(captcha_post(AFTER_EPOCH, None, "ab#1"), 0x0a);
//! assert_eq!(post.id().selector(), 10);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{TestFixture, AFTER_EPOCH};
pub use vectors::{all_vectors, verify_all_vectors, CanonicalVector};
