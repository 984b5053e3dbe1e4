//! Chain eligibility: which ancestors may lend their challenge to a new post.

use crate::record::Record;

/// Protocol epoch (2023-05-11 18:58:56 UTC). Records at or before this
/// instant use a retired captcha format and never bind a challenge.
pub const EPOCH: i64 = 1_683_831_536;

/// Answer length, in UTF-16 code units, that marks a consumed or
/// legacy-format challenge. Peers measure string length in UTF-16 units, so
/// a non-ASCII answer must be counted the same way to reach the same verdict.
pub const LEGACY_ANSWER_LEN: usize = 5;

/// Outcome of the eligibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// No captcha, or a captcha with an empty answer.
    NoCaptcha,
    /// Answer has the legacy sentinel length.
    LegacyAnswer,
    /// Timestamp is not strictly after [`EPOCH`].
    BeforeEpoch,
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        self == Self::Eligible
    }
}

/// Classify a record as a chain ancestor.
pub fn eligibility(record: &Record) -> Eligibility {
    let answer = match &record.captcha {
        Some(c) if !c.answer.is_empty() => &c.answer,
        _ => return Eligibility::NoCaptcha,
    };
    if answer.encode_utf16().count() == LEGACY_ANSWER_LEN {
        return Eligibility::LegacyAnswer;
    }
    if record.timestamp <= EPOCH {
        return Eligibility::BeforeEpoch;
    }
    Eligibility::Eligible
}

/// Shorthand for `eligibility(record).is_eligible()`.
pub fn is_eligible(record: &Record) -> bool {
    eligibility(record).is_eligible()
}
