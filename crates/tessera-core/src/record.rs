//! Record: the atomic unit of board content.
//!
//! A record is an immutable event: a post, a comment, or a private message.
//! Once written it is never edited; its id is derived from its content.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_bytes, signed_message};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::types::{BucketId, RecordId};

/// Width of a time bucket in seconds.
pub const DAY_SECS: i64 = 86_400;

/// The coarse time bucket a timestamp falls into: `floor(ts / 86400) * 86400`.
///
/// Saturates at the ends of the `i64` range; validation keeps real records
/// far from them.
pub fn day_bucket(ts: i64) -> i64 {
    ts.div_euclid(DAY_SECS).saturating_mul(DAY_SECS)
}

/// Current wall-clock time in Unix seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The kind of record, determining where it is filed and which fields apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Top-level board post. Legacy records without a kind are posts.
    #[default]
    Post,
    /// Reply to a post or to another comment.
    Comment,
    /// Private message, only ever stored encrypted.
    Message,
}

impl RecordKind {
    /// Canonical text tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Message => "message",
        }
    }
}

/// A captcha challenge attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captcha {
    /// The expected answer (lowercase).
    pub answer: String,
    /// Rendered challenge image as a data URL.
    pub image: String,
}

impl Captcha {
    /// Check a user's attempt against the answer.
    pub fn check(&self, attempt: &str) -> bool {
        !self.answer.is_empty() && attempt.trim().to_lowercase() == self.answer.to_lowercase()
    }
}

/// A board record.
///
/// Optional fields are omitted from the canonical encoding when absent, so a
/// record written by an older peer hashes to the same id everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub kind: RecordKind,

    /// Author-claimed creation time (Unix seconds). Untrusted.
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub text: String,

    /// The prior post in the board chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<RecordId>,

    /// The post or comment this comment replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<Captcha>,

    /// Reference to an out-of-line content node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Mailbox the message was addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<BucketId>,

    #[serde(default)]
    pub nonce: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<Ed25519PublicKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<Ed25519Signature>,
}

impl Record {
    /// Compute the record ID (Blake3 hash of canonical bytes).
    pub fn id(&self) -> RecordId {
        RecordId(Blake3Hash::hash(&canonical_bytes(self)).0)
    }

    /// The record with its signature cleared: the form that gets signed.
    pub fn unsigned(&self) -> Record {
        Record {
            sig: None,
            ..self.clone()
        }
    }

    /// Attach `keypair`'s public key and sign.
    ///
    /// Any previous signature is replaced.
    pub fn sign(mut self, keypair: &Keypair) -> Record {
        self.pub_key = Some(keypair.public_key());
        self.sig = None;
        let message = signed_message(&self);
        self.sig = Some(keypair.sign(&message));
        self
    }

    /// Whether the record claims an author.
    pub fn is_signed(&self) -> bool {
        self.pub_key.is_some()
    }

    pub fn is_post(&self) -> bool {
        self.kind == RecordKind::Post
    }

    pub fn is_comment(&self) -> bool {
        self.kind == RecordKind::Comment
    }

    /// The day bucket this record is filed under.
    pub fn bucket(&self) -> i64 {
        day_bucket(self.timestamp)
    }
}

/// Builder for creating records.
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Start building a record of the given kind.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            record: Record {
                kind,
                timestamp: 0,
                title: None,
                text: String::new(),
                prev: None,
                parent: None,
                captcha: None,
                content: None,
                recipient: None,
                nonce: 0,
                pub_key: None,
                sig: None,
            },
        }
    }

    /// Start a post.
    pub fn post(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(RecordKind::Post).title(title).text(text)
    }

    /// Start a comment replying to `parent`.
    pub fn comment(parent: RecordId, text: impl Into<String>) -> Self {
        Self::new(RecordKind::Comment).parent(parent).text(text)
    }

    /// Start a private message.
    pub fn message(text: impl Into<String>) -> Self {
        Self::new(RecordKind::Message).text(text)
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.record.timestamp = ts;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = Some(title.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.record.text = text.into();
        self
    }

    /// Set the previous post in the chain.
    pub fn prev(mut self, prev: RecordId) -> Self {
        self.record.prev = Some(prev);
        self
    }

    /// Set the parent post or comment.
    pub fn parent(mut self, parent: RecordId) -> Self {
        self.record.parent = Some(parent);
        self
    }

    pub fn captcha(mut self, answer: impl Into<String>, image: impl Into<String>) -> Self {
        self.record.captcha = Some(Captcha {
            answer: answer.into(),
            image: image.into(),
        });
        self
    }

    pub fn content(mut self, reference: impl Into<String>) -> Self {
        self.record.content = Some(reference.into());
        self
    }

    pub fn recipient(mut self, bucket: BucketId) -> Self {
        self.record.recipient = Some(bucket);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.record.nonce = nonce;
        self
    }

    /// Build an anonymous (unsigned) record.
    pub fn build(self) -> Record {
        self.record
    }

    /// Build and sign the record.
    pub fn sign(self, keypair: &Keypair) -> Record {
        self.record.sign(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bucket() {
        assert_eq!(day_bucket(0), 0);
        assert_eq!(day_bucket(86_399), 0);
        assert_eq!(day_bucket(86_400), 86_400);
        assert_eq!(day_bucket(1_700_000_000), 1_699_920_000);
        assert_eq!(day_bucket(-1), -86_400);
        assert_eq!(day_bucket(i64::MIN), i64::MIN);
        assert_eq!(day_bucket(i64::MAX), i64::MAX - i64::MAX.rem_euclid(DAY_SECS));
    }

    #[test]
    fn test_record_id_deterministic() {
        let record = RecordBuilder::post("title", "body")
            .timestamp(1_700_000_000)
            .build();
        assert_eq!(record.id(), record.id());
        assert_eq!(record.id(), record.clone().id());
    }

    #[test]
    fn test_record_id_changes_with_content() {
        let a = RecordBuilder::post("t", "a").timestamp(1).build();
        let b = RecordBuilder::post("t", "b").timestamp(1).build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_signature_changes_id_but_not_signed_form() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let anon = RecordBuilder::post("t", "x").timestamp(1_700_000_000).build();
        let signed = anon.clone().sign(&keypair);

        assert_ne!(anon.id(), signed.id());
        assert_eq!(signed.pub_key, Some(keypair.public_key()));
        assert!(signed.sig.is_some());
        assert!(signed.unsigned().sig.is_none());
    }

    #[test]
    fn test_captcha_check() {
        let captcha = Captcha {
            answer: "ab#1".into(),
            image: String::new(),
        };
        assert!(captcha.check("AB#1"));
        assert!(captcha.check(" ab#1 "));
        assert!(!captcha.check("ab#2"));

        let empty = Captcha {
            answer: String::new(),
            image: String::new(),
        };
        assert!(!empty.check(""));
    }

    #[test]
    fn test_legacy_json_defaults() {
        let json = r#"{"timestamp": 1683831000, "title": "old", "text": "hi"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, RecordKind::Post);
        assert_eq!(record.nonce, 0);
        assert!(record.captcha.is_none());
    }
}
