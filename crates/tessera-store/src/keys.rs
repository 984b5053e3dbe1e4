//! Key schema for the graph.
//!
//! Nodes are addressed by plain string keys; collections are sets of
//! content-keyed members. Every peer must agree on these strings.

use tessera_core::{day_bucket, BucketId, RecordId, RecordKind};

/// Global set of every post ever submitted.
pub const POSTS: &str = "posts";

/// Node key for a post.
pub fn post_key(id: &RecordId) -> String {
    format!("#posts/{}", id.to_hex())
}

/// Node key for a comment.
pub fn comment_key(id: &RecordId) -> String {
    format!("#comments/{}", id.to_hex())
}

/// Node key for a record of the given kind.
///
/// Messages never get a plaintext node; they live only in mailboxes.
pub fn record_key(kind: RecordKind, id: &RecordId) -> Option<String> {
    match kind {
        RecordKind::Post => Some(post_key(id)),
        RecordKind::Comment => Some(comment_key(id)),
        RecordKind::Message => None,
    }
}

/// Chronological collection for records of `kind` in the day containing `ts`.
pub fn day_collection(kind: RecordKind, ts: i64) -> String {
    format!("days/{}/{}", kind.as_str(), day_bucket(ts))
}

/// Member set holding the replies to `parent`.
pub fn comments_of(parent: &RecordId) -> String {
    format!("comments-of/{}", parent.to_hex())
}

/// Mailbox collection for a bucket label.
pub fn mailbox(bucket: &BucketId) -> String {
    format!("mailbox/{}", bucket.to_hex())
}

/// Node key for an out-of-line content node.
pub fn content_key(reference: &str) -> String {
    format!("content/{}", reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_collection_uses_bucket_start() {
        assert_eq!(
            day_collection(RecordKind::Post, 1_700_000_000),
            "days/post/1699920000"
        );
        assert_eq!(
            day_collection(RecordKind::Post, 1_699_920_000),
            day_collection(RecordKind::Post, 1_700_006_399)
        );
    }

    #[test]
    fn test_record_keys_are_kind_scoped() {
        let id = RecordId::from_bytes([0xab; 32]);
        assert!(post_key(&id).starts_with("#posts/"));
        assert!(comment_key(&id).starts_with("#comments/"));
        assert_ne!(post_key(&id), comment_key(&id));
        assert!(record_key(RecordKind::Message, &id).is_none());
    }
}
