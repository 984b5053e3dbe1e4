//! Proptest generators for property-based testing.

use proptest::prelude::*;

use tessera_core::{
    BucketId, Captcha, Keypair, Record, RecordId, RecordKind, EPOCH, MAX_TIMESTAMP,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random RecordId.
pub fn record_id() -> impl Strategy<Value = RecordId> {
    any::<[u8; 32]>().prop_map(RecordId::from_bytes)
}

/// Generate a random BucketId.
pub fn bucket_id() -> impl Strategy<Value = BucketId> {
    any::<[u8; 32]>().prop_map(BucketId::from_bytes)
}

/// Generate an accepted timestamp on either side of the epoch, including
/// negatives and both ends of the range.
pub fn timestamp() -> impl Strategy<Value = i64> {
    prop_oneof![
        -1_000_000i64..1_000_000,
        (EPOCH - 100)..(EPOCH + 100),
        -MAX_TIMESTAMP..=MAX_TIMESTAMP,
    ]
}

/// Generate a RecordKind.
pub fn record_kind() -> impl Strategy<Value = RecordKind> {
    prop_oneof![
        Just(RecordKind::Post),
        Just(RecordKind::Comment),
        Just(RecordKind::Message),
    ]
}

/// Generate a captcha with an answer of 0 to 8 characters.
pub fn captcha() -> impl Strategy<Value = Captcha> {
    ("[a-z0-9!@#$%^&*()]{0,8}", ".{0,32}").prop_map(|(answer, image)| Captcha { answer, image })
}

/// Generate display text, including non-ASCII.
pub fn text(max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<char>(), 0..=max_len).prop_map(|c| c.into_iter().collect())
}

/// Generate plaintext bytes of up to `max_len`.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate an unsigned, structurally valid record of any kind.
pub fn record() -> impl Strategy<Value = Record> {
    (
        record_kind(),
        timestamp(),
        proptest::option::of(text(16)),
        text(64),
        proptest::option::of(record_id()),
        record_id(),
        proptest::option::of(captcha()),
        proptest::option::of("[a-z0-9]{1,16}"),
        bucket_id(),
        any::<u64>(),
    )
        .prop_map(
            |(kind, timestamp, title, text, prev, link, captcha, content, bucket, nonce)| Record {
                kind,
                timestamp,
                title,
                text,
                prev: if kind == RecordKind::Post { prev } else { None },
                parent: (kind == RecordKind::Comment).then_some(link),
                captcha,
                content,
                recipient: (kind == RecordKind::Message).then_some(bucket),
                nonce,
                pub_key: None,
                sig: None,
            },
        )
}

/// Generate a record signed by a random keypair.
pub fn signed_record() -> impl Strategy<Value = Record> {
    (record(), keypair()).prop_map(|(record, keypair)| record.sign(&keypair))
}
