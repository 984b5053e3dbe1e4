//! Content addressing and submission.
//!
//! A submitted record is signed (when an identity is given), encoded
//! canonically, and written under its content-hash key. Its id is then
//! filed in the collections that make it discoverable: the day bucket for
//! its timestamp, the global post set, or its parent's comment set. Every
//! write is idempotent, so resubmitting the same record changes nothing.

use std::sync::Arc;

use tracing::debug;

use tessera_core::{
    canonical_bytes, validate_record, validate_record_structure, Keypair, Record, RecordId,
    RecordKind,
};
use tessera_store::{keys, GraphStore, PutResult};

use crate::error::{BoardError, Result};

/// Where a comment is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    Post(RecordId),
    /// A reply to another comment.
    Comment(RecordId),
}

impl ParentRef {
    pub fn id(&self) -> RecordId {
        match self {
            Self::Post(id) | Self::Comment(id) => *id,
        }
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: RecordId,
    /// False if the record was already stored.
    pub inserted: bool,
}

/// Writes posts and comments to the graph.
#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn GraphStore>,
}

impl Submitter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Submit a post.
    pub async fn submit_post(&self, record: Record, signer: Option<&Keypair>) -> Result<Submission> {
        if record.kind != RecordKind::Post {
            return Err(BoardError::InvalidOperation(format!(
                "submit_post given a {}",
                record.kind.as_str()
            )));
        }
        let record = prepare(record, signer)?;
        let submission = self.write(&record).await?;
        self.file(keys::POSTS, &submission.id).await?;
        Ok(submission)
    }

    /// Submit a comment under `parent`.
    ///
    /// A comment without a `parent` field takes the target's id; one that
    /// names a different parent is rejected.
    pub async fn submit_comment(
        &self,
        mut record: Record,
        parent: ParentRef,
        signer: Option<&Keypair>,
    ) -> Result<Submission> {
        if record.kind != RecordKind::Comment {
            return Err(BoardError::InvalidOperation(format!(
                "submit_comment given a {}",
                record.kind.as_str()
            )));
        }
        let target = parent.id();
        match record.parent {
            None => record.parent = Some(target),
            Some(claimed) if claimed != target => {
                return Err(BoardError::ParentMismatch { claimed, target })
            }
            Some(_) => {}
        }

        let record = prepare(record, signer)?;
        let submission = self.write(&record).await?;
        self.file(&keys::comments_of(&target), &submission.id).await?;
        Ok(submission)
    }

    /// Node write plus day bucket.
    async fn write(&self, record: &Record) -> Result<Submission> {
        let id = record.id();
        let key = keys::record_key(record.kind, &id).ok_or_else(|| {
            BoardError::InvalidOperation("messages are sent through a mailbox".into())
        })?;

        let put = self.store.put(&key, &canonical_bytes(record)).await?;
        self.file(&keys::day_collection(record.kind, record.timestamp), &id)
            .await?;

        let inserted = put == PutResult::Inserted;
        debug!(id = %id, key = %key, inserted, "record stored");
        Ok(Submission { id, inserted })
    }

    async fn file(&self, collection: &str, id: &RecordId) -> Result<()> {
        self.store.set(collection, id.to_hex().as_bytes()).await?;
        Ok(())
    }
}

/// Check structure, sign if asked, and check the result.
fn prepare(record: Record, signer: Option<&Keypair>) -> Result<Record> {
    validate_record_structure(&record)?;
    let record = match signer {
        Some(keypair) => record.sign(keypair),
        None => record,
    };
    // Catches records that arrive pre-signed but altered.
    validate_record(&record)?;
    Ok(record)
}
