//! The Board: one service context for the whole protocol.
//!
//! A board owns its store handles, the chain resolver, the challenge
//! generator, the mailbox, and the settings writer. Each request/response
//! channel the UI speaks is one method here.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use tessera_chain::{Binding, Challenge, ChallengeGenerator, Resolver, ResolverStatsSnapshot};
use tessera_core::{decode_record, verify, CoreError, Ed25519PublicKey, Record, RecordId, RecordKind};
use tessera_mail::{Delivery, EncryptionPublicKey, Inbox, Mailbox};
use tessera_store::{keys, BlobStore, GraphStore};

use crate::addressing::{ParentRef, Submitter};
use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::feed::Feed;
use crate::identity::Identity;
use crate::settings::{Settings, SettingsHandle};

/// A post together with its out-of-line content node, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichPost {
    pub record: Record,
    /// `None` when the post has no content reference or the node has not
    /// arrived yet.
    pub content: Option<Bytes>,
}

/// The board service.
pub struct Board {
    store: Arc<dyn GraphStore>,
    config: BoardConfig,
    submitter: Submitter,
    resolver: Resolver,
    challenges: ChallengeGenerator,
    mailbox: Mailbox,
    settings: SettingsHandle,
}

impl Board {
    /// Open a board over a graph store and a settings blob store.
    ///
    /// Loads (and if needed upgrades) the local settings before returning.
    pub async fn open(
        store: Arc<dyn GraphStore>,
        blobs: Arc<dyn BlobStore>,
        config: BoardConfig,
    ) -> Result<Self> {
        let settings =
            SettingsHandle::spawn(blobs, config.settings.clone(), config.identity.clone()).await?;
        info!("board opened");

        Ok(Self {
            submitter: Submitter::new(store.clone()),
            resolver: Resolver::new(store.clone(), config.resolver.clone()),
            challenges: ChallengeGenerator::new(config.challenge.clone()),
            mailbox: Mailbox::new(store.clone()),
            store,
            config,
            settings,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Stop the settings writer and close the graph store. Open feeds and
    /// inboxes end.
    pub async fn shutdown(&self) -> Result<()> {
        self.settings.shutdown().await;
        self.store.close().await?;
        info!("board shut down");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Posts and Comments
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a post by id.
    ///
    /// Fails if the stored bytes do not decode, do not hash to `id`, or carry
    /// a signature that does not verify.
    pub async fn load_post(&self, id: &RecordId) -> Result<Option<Record>> {
        let Some(bytes) = self.store.get(&keys::post_key(id)).await? else {
            return Ok(None);
        };
        let record = decode_record(&bytes)?;
        let actual = record.id();
        if actual != *id {
            return Err(CoreError::IdMismatch {
                expected: *id,
                actual,
            }
            .into());
        }
        if !verify(&record) {
            return Err(CoreError::InvalidSignature.into());
        }
        Ok(Some(record))
    }

    /// Load a post and its content node.
    pub async fn load_post_rich(&self, id: &RecordId) -> Result<Option<RichPost>> {
        let Some(record) = self.load_post(id).await? else {
            return Ok(None);
        };
        let content = match &record.content {
            Some(reference) => {
                let node = self.store.get(&keys::content_key(reference)).await?;
                if node.is_none() {
                    debug!(post = %id, reference = %reference, "content node not available");
                }
                node
            }
            None => None,
        };
        Ok(Some(RichPost { record, content }))
    }

    /// Submit a post, signed by `identity` if one is given.
    pub async fn submit_post(&self, post: Record, identity: Option<&Identity>) -> Result<RecordId> {
        let submission = self
            .submitter
            .submit_post(post, identity.map(Identity::keypair))
            .await?;
        Ok(submission.id)
    }

    /// Submit a comment under `parent`.
    pub async fn submit_comment(
        &self,
        comment: Record,
        parent: ParentRef,
        identity: Option<&Identity>,
    ) -> Result<RecordId> {
        let submission = self
            .submitter
            .submit_comment(comment, parent, identity.map(Identity::keypair))
            .await?;
        Ok(submission.id)
    }

    /// Stream the comments filed under `post_id`.
    pub async fn get_comments(&self, post_id: &RecordId) -> Result<Feed<Record>> {
        Feed::open(
            self.store.clone(),
            &keys::comments_of(post_id),
            RecordKind::Comment,
            &self.config.feed,
            |r| r,
        )
        .await
    }

    /// Stream the posts in the day bucket containing `ts`, with their
    /// timestamps.
    pub async fn load_chunk(&self, ts: i64) -> Result<Feed<(i64, Record)>> {
        Feed::open(
            self.store.clone(),
            &keys::day_collection(RecordKind::Post, ts),
            RecordKind::Post,
            &self.config.feed,
            |r| (r.timestamp, r),
        )
        .await
    }

    /// Stream every post ever submitted.
    pub async fn all_posts(&self) -> Result<Feed<Record>> {
        Feed::open(
            self.store.clone(),
            keys::POSTS,
            RecordKind::Post,
            &self.config.feed,
            |r| r,
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Captcha
    // ─────────────────────────────────────────────────────────────────────────

    /// The challenge `record` is bound to, if any.
    pub async fn load_captcha(&self, record: &Record) -> Result<Option<Binding>> {
        Ok(self.resolver.resolve(record).await?)
    }

    /// A new challenge for the submitter to attach to their post.
    pub fn gen_captcha(&self) -> Challenge {
        self.challenges.generate()
    }

    pub fn resolver_stats(&self) -> ResolverStatsSnapshot {
        self.resolver.stats()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings and Identities
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn settings(&self) -> Result<Settings> {
        Ok(self.settings.snapshot().await?)
    }

    /// Every usable identity in the settings. Entries that fail to load are
    /// skipped with a warning.
    pub async fn identities(&self) -> Result<Vec<Identity>> {
        let settings = self.settings.snapshot().await?;
        Ok(settings
            .identities
            .iter()
            .filter_map(|stored| match stored.load() {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(pub_key = %stored.pub_key, error = %e, "skipping unusable identity");
                    None
                }
            })
            .collect())
    }

    /// The identity with signing key `pub_key`.
    pub async fn identity(&self, pub_key: &Ed25519PublicKey) -> Result<Option<Identity>> {
        let settings = self.settings.snapshot().await?;
        settings.identity(pub_key).map(|s| s.load()).transpose()
    }

    pub async fn generate_identity(&self) -> Result<Settings> {
        Ok(self.settings.generate_identity().await?)
    }

    /// Remove an identity. Content it already signed stays published.
    pub async fn remove_identity(&self, pub_key: Ed25519PublicKey) -> Result<Settings> {
        Ok(self.settings.remove_identity(pub_key).await?)
    }

    /// Replace the settings document with an edited copy.
    pub async fn modified_settings(&self, settings: Settings) -> Result<()> {
        Ok(self.settings.replace(settings).await?)
    }

    pub async fn set_theme(&self, theme: impl Into<String>) -> Result<Settings> {
        Ok(self.settings.set_theme(theme).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign `message` as `sender` and deliver it to `recipient`, keeping a
    /// copy in the sender's own mailbox.
    pub async fn submit_message(
        &self,
        mut message: Record,
        sender: &Identity,
        recipient: &EncryptionPublicKey,
    ) -> Result<Delivery> {
        if message.kind != RecordKind::Message {
            return Err(BoardError::InvalidOperation(format!(
                "submit_message given a {}",
                message.kind.as_str()
            )));
        }
        let bucket = recipient.bucket()?;
        match message.recipient {
            None => message.recipient = Some(bucket),
            Some(claimed) if claimed != bucket => {
                return Err(BoardError::InvalidOperation(
                    "message addressed to a different mailbox".into(),
                ))
            }
            Some(_) => {}
        }
        tessera_core::validate_record_structure(&message)?;

        let message = message.sign(sender.keypair());
        Ok(self
            .mailbox
            .send(&message, &sender.encryption().public, recipient)
            .await?)
    }

    /// Standing subscription on `identity`'s mailbox.
    pub async fn inbox(&self, identity: &Identity) -> Result<Inbox> {
        Ok(self
            .mailbox
            .inbox(identity.encryption().private.clone())
            .await?)
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("config", &self.config)
            .field("resolver", &self.resolver.stats())
            .finish()
    }
}
