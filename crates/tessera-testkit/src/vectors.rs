//! Canonical test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding byte for byte, so any
//! implementation that disagrees produces different record ids.

use tessera_core::{canonical_bytes, Record, RecordBuilder, RecordId, RecordKind};

/// A canonical test vector.
#[derive(Debug, Clone)]
pub struct CanonicalVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub record: Record,
    /// Expected canonical bytes (hex).
    pub expected_hex: &'static str,
}

/// Get all canonical test vectors.
pub fn all_vectors() -> Vec<CanonicalVector> {
    vec![
        CanonicalVector {
            name: "minimal post",
            record: RecordBuilder::new(RecordKind::Post)
                .timestamp(1_700_000_000)
                .text("hi")
                .build(),
            expected_hex: "a4646b696e6464706f73746474657874626869656e6f6e6365006974696d657374616d701a6553f100",
        },
        CanonicalVector {
            name: "post with title, prev, and captcha",
            record: RecordBuilder::post("hello", "world")
                .timestamp(1_683_831_537)
                .prev(RecordId::from_bytes([0x11; 32]))
                .captcha("ab#1", "data:,")
                .nonce(42)
                .build(),
            expected_hex: concat!(
                "a7646b696e6464706f737464707265767840",
                "3131313131313131313131313131313131313131313131313131313131313131",
                "3131313131313131313131313131313131313131313131313131313131313131",
                "647465787465776f726c64656e6f6e6365182a657469746c656568656c6c6f67",
                "63617074636861a265696d61676566646174613a2c66616e7377657264616223",
                "316974696d657374616d701a645d3af1"
            ),
        },
        CanonicalVector {
            name: "comment",
            record: RecordBuilder::comment(RecordId::from_bytes([0x22; 32]), "reply")
                .timestamp(1_700_000_001)
                .build(),
            expected_hex: concat!(
                "a5646b696e6467636f6d6d656e746474657874657265706c79656e6f6e636500",
                "66706172656e747840",
                "3232323232323232323232323232323232323232323232323232323232323232",
                "3232323232323232323232323232323232323232323232323232323232323232",
                "6974696d657374616d701a6553f101"
            ),
        },
        CanonicalVector {
            name: "negative timestamp, empty text",
            record: RecordBuilder::new(RecordKind::Post).timestamp(-1).build(),
            expected_hex: "a4646b696e6464706f7374647465787460656e6f6e6365006974696d657374616d7020",
        },
    ]
}

/// Check every vector, reporting the first mismatch.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let actual = hex::encode(canonical_bytes(&vector.record));
        if actual != vector.expected_hex {
            return Err(format!(
                "{}: expected {}, got {}",
                vector.name, vector.expected_hex, actual
            ));
        }
    }
    Ok(())
}
