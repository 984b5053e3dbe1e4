//! Record validation: signature verification and structural checks.

use crate::canonical::signed_message;
use crate::error::ValidationError;
use crate::record::{Record, RecordKind};

/// Maximum title length in bytes.
pub const MAX_TITLE_LEN: usize = 512;

/// Maximum inline text length in bytes. Larger bodies go in a content node.
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// Maximum captcha image length in bytes.
pub const MAX_IMAGE_LEN: usize = 1024 * 1024;

/// Largest timestamp magnitude accepted: the exact-integer range of an IEEE
/// double, which is what peers store timestamps as.
pub const MAX_TIMESTAMP: i64 = (1 << 53) - 1;

/// Validate a record's structure and signature.
///
/// This performs:
/// - Per-kind structural rules (parent, recipient)
/// - Timestamp range and field length limits
/// - Signature verification, if the record claims an author
pub fn validate_record(record: &Record) -> Result<(), ValidationError> {
    validate_record_structure(record)?;

    if let (Some(pk), Some(sig)) = (&record.pub_key, &record.sig) {
        pk.verify(&signed_message(record), sig)
            .map_err(|_| ValidationError::SignatureFailed)?;
    } else if record.pub_key.is_some() {
        // Claims an author but carries no proof.
        return Err(ValidationError::SignatureFailed);
    }

    Ok(())
}

/// Validate record structure without signature verification.
///
/// Submission runs this before signing, since the signature does not exist
/// yet.
pub fn validate_record_structure(record: &Record) -> Result<(), ValidationError> {
    match record.kind {
        RecordKind::Comment => {
            if record.parent.is_none() {
                return Err(ValidationError::MissingParent);
            }
        }
        RecordKind::Post => {
            if record.parent.is_some() {
                return Err(ValidationError::UnexpectedParent("post"));
            }
        }
        RecordKind::Message => {
            if record.parent.is_some() {
                return Err(ValidationError::UnexpectedParent("message"));
            }
            if record.recipient.is_none() {
                return Err(ValidationError::MissingRecipient);
            }
        }
    }

    if record.sig.is_some() && record.pub_key.is_none() {
        return Err(ValidationError::SignatureWithoutKey);
    }

    if !(-MAX_TIMESTAMP..=MAX_TIMESTAMP).contains(&record.timestamp) {
        return Err(ValidationError::TimestampOutOfRange(record.timestamp));
    }

    if let Some(title) = &record.title {
        check_len("title", title.len(), MAX_TITLE_LEN)?;
    }
    check_len("text", record.text.len(), MAX_TEXT_LEN)?;
    if let Some(captcha) = &record.captcha {
        check_len("captcha image", captcha.image.len(), MAX_IMAGE_LEN)?;
    }

    Ok(())
}

/// Signature check only.
///
/// An unsigned record is anonymous and trivially valid. A record with a
/// public key is valid iff its signature verifies over the record with the
/// signature cleared; missing or malformed key material fails closed.
pub fn verify(record: &Record) -> bool {
    match (&record.pub_key, &record.sig) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(pk), Some(sig)) => pk.verify(&signed_message(record), sig).is_ok(),
    }
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), ValidationError> {
    if len > max {
        return Err(ValidationError::FieldTooLong { field, len, max });
    }
    Ok(())
}
