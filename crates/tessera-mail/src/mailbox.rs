//! Mailbox routing.
//!
//! A message is encrypted twice and filed in two member sets: once under
//! the recipient's bucket, once under the sender's own bucket for the
//! "sent" view. Reading a mailbox is a standing subscription on one bucket.

use std::str;
use std::sync::Arc;

use tracing::{debug, warn};

use tessera_core::{verify, BucketId, FeedStats, FeedStatsSnapshot, Record, RecordKind};
use tessera_store::{keys, GraphStore, Subscription};

use crate::cipher::{open_record, seal_record};
use crate::error::{MailError, Result};
use crate::keys::{EncryptionPrivateKey, EncryptionPublicKey};

/// Member keys of the two stored copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub sent: String,
}

/// Sends into and opens mailboxes on a graph store.
#[derive(Clone)]
pub struct Mailbox {
    store: Arc<dyn GraphStore>,
}

impl Mailbox {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Encrypt `message` to both parties and file both copies.
    ///
    /// The message should already carry its recipient bucket and signature;
    /// both are sealed inside the ciphertext.
    pub async fn send(
        &self,
        message: &Record,
        sender: &EncryptionPublicKey,
        recipient: &EncryptionPublicKey,
    ) -> Result<Delivery> {
        if message.kind != RecordKind::Message {
            return Err(MailError::Payload(format!(
                "expected a message, got a {}",
                message.kind.as_str()
            )));
        }

        let to_recipient = seal_record(recipient, message)?;
        let to_sender = seal_record(sender, message)?;

        let recipient_box = keys::mailbox(&recipient.bucket()?);
        let sender_box = keys::mailbox(&sender.bucket()?);

        let delivered = self.store.set(&recipient_box, to_recipient.as_bytes()).await?;
        let sent = self.store.set(&sender_box, to_sender.as_bytes()).await?;
        debug!(mailbox = %recipient_box, key = %delivered.key, "message delivered");

        Ok(Delivery {
            recipient: delivered.key,
            sent: sent.key,
        })
    }

    /// Open a standing subscription on the mailbox of `key`.
    pub async fn inbox(&self, key: EncryptionPrivateKey) -> Result<Inbox> {
        let bucket = key.public_key().bucket()?;
        let stats = Arc::new(FeedStats::new());
        let subscription = self
            .store
            .subscribe(&keys::mailbox(&bucket))
            .await?
            .with_stats(stats.clone());
        Ok(Inbox {
            bucket,
            key,
            subscription,
            stats,
        })
    }
}

/// Decrypted messages arriving in one mailbox.
///
/// Items that fail to decrypt, parse, or verify are logged, counted, and
/// skipped; the subscription keeps going.
pub struct Inbox {
    bucket: BucketId,
    key: EncryptionPrivateKey,
    subscription: Subscription,
    stats: Arc<FeedStats>,
}

impl Inbox {
    /// Next deliverable message. `None` once the store has closed.
    pub async fn next(&mut self) -> Option<Record> {
        loop {
            let member = self.subscription.next().await?;

            let ciphertext = match str::from_utf8(&member.value) {
                Ok(text) => text,
                Err(e) => {
                    warn!(bucket = ?self.bucket, key = %member.key, error = %e, "non-text mailbox item");
                    self.stats.record_parse_error();
                    continue;
                }
            };

            match open_record(&self.key, ciphertext).await {
                Ok(record) if verify(&record) => {
                    self.stats.record_delivered();
                    return Some(record);
                }
                Ok(_) => {
                    warn!(bucket = ?self.bucket, key = %member.key, "message signature invalid");
                    self.stats.record_crypto_error();
                }
                Err(e) if e.is_parse_error() => {
                    warn!(bucket = ?self.bucket, key = %member.key, error = %e, "unreadable message");
                    self.stats.record_parse_error();
                }
                Err(e) => {
                    warn!(bucket = ?self.bucket, key = %member.key, error = %e, "message decryption failed");
                    self.stats.record_crypto_error();
                }
            }
        }
    }

    pub fn bucket(&self) -> BucketId {
        self.bucket
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox")
            .field("bucket", &self.bucket)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::encrypt;
    use crate::keys::test_keys::{other, small};
    use tessera_core::{Keypair, RecordBuilder};
    use tessera_store::MemoryStore;

    fn message(to: &EncryptionPublicKey, text: &str) -> Record {
        RecordBuilder::message(text)
            .timestamp(1_700_000_000)
            .recipient(to.bucket().unwrap())
            .sign(&Keypair::from_seed(&[3; 32]))
    }

    #[tokio::test]
    async fn test_send_files_two_copies() {
        let store = Arc::new(MemoryStore::new());
        let mailbox = Mailbox::new(store.clone());
        let (alice, bob) = (small(), other());

        let msg = message(&bob.public, "hi bob");
        mailbox.send(&msg, &alice.public, &bob.public).await.unwrap();

        let bob_box = keys::mailbox(&bob.public.bucket().unwrap());
        let alice_box = keys::mailbox(&alice.public.bucket().unwrap());
        assert_eq!(store.members(&bob_box).await.unwrap().len(), 1);
        assert_eq!(store.members(&alice_box).await.unwrap().len(), 1);

        let mut inbox = mailbox.inbox(bob.private.clone()).await.unwrap();
        assert_eq!(inbox.next().await.unwrap(), msg);

        let mut sent = mailbox.inbox(alice.private.clone()).await.unwrap();
        assert_eq!(sent.next().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn test_inbox_skips_bad_items_and_continues() {
        let store = Arc::new(MemoryStore::new());
        let mailbox = Mailbox::new(store.clone());
        let bob = other();
        let bob_box = keys::mailbox(&bob.public.bucket().unwrap());

        // Encrypted to the wrong key.
        let stray = encrypt(&small().public, b"{}").unwrap();
        store.set(&bob_box, stray.as_bytes()).await.unwrap();
        // Not a record.
        let junk = encrypt(&bob.public, b"[1,2,3]").unwrap();
        store.set(&bob_box, junk.as_bytes()).await.unwrap();
        // Tampered after signing.
        let mut forged = message(&bob.public, "real");
        forged.text = "fake".into();
        let forged = crate::cipher::seal_record(&bob.public, &forged).unwrap();
        store.set(&bob_box, forged.as_bytes()).await.unwrap();

        let good = message(&bob.public, "good");
        mailbox.send(&good, &small().public, &bob.public).await.unwrap();

        let mut inbox = mailbox.inbox(bob.private.clone()).await.unwrap();
        assert_eq!(inbox.next().await.unwrap(), good);

        let stats = inbox.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.crypto_errors, 2);
        assert_eq!(stats.parse_errors, 1);
    }

    #[tokio::test]
    async fn test_inbox_receives_live_messages_and_ends_on_close() {
        let store = Arc::new(MemoryStore::new());
        let mailbox = Mailbox::new(store.clone());
        let bob = other();

        let mut inbox = mailbox.inbox(bob.private.clone()).await.unwrap();
        let msg = message(&bob.public, "live");
        mailbox.send(&msg, &small().public, &bob.public).await.unwrap();
        // Redelivery of the same ciphertext is suppressed.
        let copy = store
            .members(&keys::mailbox(&bob.public.bucket().unwrap()))
            .await
            .unwrap();
        store
            .set(&keys::mailbox(&bob.public.bucket().unwrap()), &copy[0].value)
            .await
            .unwrap();

        assert_eq!(inbox.next().await.unwrap(), msg);
        store.close().await.unwrap();
        assert!(inbox.next().await.is_none());
        assert_eq!(inbox.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_send_rejects_non_messages() {
        let mailbox = Mailbox::new(Arc::new(MemoryStore::new()));
        let post = RecordBuilder::post("t", "x").build();
        assert!(mailbox
            .send(&post, &small().public, &other().public)
            .await
            .is_err());
    }
}
