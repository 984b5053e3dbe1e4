//! Counters for stream isolation boundaries.
//!
//! Feeds and inboxes drop bad items instead of failing; these counters are
//! how the drops stay visible.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-stream item counters. Shared between a stream and its observers.
#[derive(Debug, Default)]
pub struct FeedStats {
    delivered: AtomicU64,
    parse_errors: AtomicU64,
    crypto_errors: AtomicU64,
    duplicates: AtomicU64,
}

/// Point-in-time copy of [`FeedStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStatsSnapshot {
    pub delivered: u64,
    pub parse_errors: u64,
    pub crypto_errors: u64,
    pub duplicates: u64,
}

impl FeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crypto_error(&self) {
        self.crypto_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            crypto_errors: self.crypto_errors.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

impl FeedStatsSnapshot {
    /// Items that reached the stream but were not delivered.
    pub fn dropped(&self) -> u64 {
        self.parse_errors + self.crypto_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = FeedStats::new();
        stats.record_delivered();
        stats.record_delivered();
        stats.record_parse_error();
        stats.record_crypto_error();
        stats.record_duplicate();

        let snap = stats.snapshot();
        assert_eq!(snap.delivered, 2);
        assert_eq!(snap.duplicates, 1);
        assert_eq!(snap.dropped(), 2);
    }
}
