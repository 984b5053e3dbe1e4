//! Test fixtures and helpers.
//!
//! Common setup code for resolver, messaging, and board tests. Records are
//! planted directly in the graph under their content keys, skipping the
//! submission path.

use std::sync::Arc;

use tessera_core::{canonical_bytes, Keypair, Record, RecordBuilder, RecordId, EPOCH};
use tessera_store::{keys, GraphStore, MemoryStore};

/// A timestamp safely after the protocol epoch.
pub const AFTER_EPOCH: i64 = EPOCH + 1_000;

/// A test fixture with a keypair and memory store.
pub struct TestFixture {
    pub keypair: Keypair,
    pub store: Arc<MemoryStore>,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Plant `len` eligible, signed posts, oldest first. Returns them
    /// nearest first, the order a walk collects them in.
    pub async fn plant_chain(&self, len: usize) -> anyhow::Result<Vec<(RecordId, Record)>> {
        let mut prev = None;
        let mut chain = Vec::with_capacity(len);
        for i in 0..len {
            let mut builder = RecordBuilder::post(format!("post {}", i), "body")
                .timestamp(AFTER_EPOCH + i as i64)
                .captcha(format!("c{:03}", i), "data:,");
            if let Some(p) = prev {
                builder = builder.prev(p);
            }
            let post = builder.sign(&self.keypair);
            let id = store_post(&*self.store, &post).await?;
            prev = Some(id);
            chain.push((id, post));
        }
        chain.reverse();
        Ok(chain)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An unsigned post at `ts` carrying a captcha with `answer`.
pub fn captcha_post(ts: i64, prev: Option<RecordId>, answer: &str) -> Record {
    let mut builder = RecordBuilder::post("post", "body")
        .timestamp(ts)
        .captcha(answer, "data:,");
    if let Some(p) = prev {
        builder = builder.prev(p);
    }
    builder.build()
}

/// Bump `record.nonce` until its id's selector equals `target`.
///
/// Clears any signature; sign afterwards if needed. Takes about 256 tries.
pub fn with_selector(mut record: Record, target: u8) -> Record {
    record.sig = None;
    record.pub_key = None;
    while record.id().selector() != target {
        record.nonce = record.nonce.wrapping_add(1);
    }
    record
}

/// Write `record` under its post key.
pub async fn store_post<S: GraphStore + ?Sized>(
    store: &S,
    record: &Record,
) -> anyhow::Result<RecordId> {
    let id = record.id();
    store.put(&keys::post_key(&id), &canonical_bytes(record)).await?;
    Ok(id)
}

/// Write `record` under its comment key.
pub async fn store_comment<S: GraphStore + ?Sized>(
    store: &S,
    record: &Record,
) -> anyhow::Result<RecordId> {
    let id = record.id();
    store
        .put(&keys::comment_key(&id), &canonical_bytes(record))
        .await?;
    Ok(id)
}

/// Keypairs for a group of participants, deterministic by index.
pub fn participants(count: u8) -> Vec<Keypair> {
    (0..count).map(|i| Keypair::from_seed(&[i + 1; 32])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::is_eligible;

    #[test]
    fn test_with_selector_hits_target() {
        for target in [0u8, 0x0a, 0xff] {
            let post = with_selector(captcha_post(AFTER_EPOCH, None, "abcd"), target);
            assert_eq!(post.id().selector(), target);
        }
    }

    #[tokio::test]
    async fn test_plant_chain_links_and_is_eligible() {
        let fixture = TestFixture::with_seed([5; 32]);
        let chain = fixture.plant_chain(4).await.unwrap();

        assert_eq!(chain.len(), 4);
        for pair in chain.windows(2) {
            assert_eq!(pair[0].1.prev, Some(pair[1].0));
        }
        assert!(chain.iter().all(|(_, r)| is_eligible(r) && tessera_core::verify(r)));
        assert_eq!(fixture.store.node_count().unwrap(), 4);
    }

    #[test]
    fn test_participants_are_distinct() {
        let people = participants(3);
        assert_ne!(people[0].public_key(), people[1].public_key());
        assert_ne!(people[1].public_key(), people[2].public_key());
    }
}
