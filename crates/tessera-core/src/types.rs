//! Strong type definitions for Tessera.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use std::fmt;

/// A 32-byte record identifier, computed as Blake3(canonical_bytes(record)).
///
/// This is the content-address of a record. Two records with the same
/// content will have the same RecordId.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub [u8; 32]);

impl_hex_serde!(RecordId, 32);

impl RecordId {
    /// Create a new RecordId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The chain selector: the value of the id's trailing two hex characters.
    ///
    /// Determines both how far back a captcha chain walk may go and which
    /// collected ancestor is chosen.
    pub const fn selector(&self) -> u8 {
        self.0[31]
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RecordId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 32-byte mailbox label: the digest of a recipient's public encryption key.
///
/// Messages are filed under the bucket so that finding your mail never
/// discloses which identity you are.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketId(pub [u8; 32]);

impl_hex_serde!(BucketId, 32);

impl BucketId {
    /// Derive the bucket label for an encoded public key.
    pub fn derive(encoded_public_key: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("tessera/mailbox-bucket/v1");
        hasher.update(encoded_public_key);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({})", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_hex_roundtrip() {
        let id = RecordId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = RecordId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_selector_is_trailing_hex_pair() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0x0a;
        let id = RecordId::from_bytes(bytes);
        assert!(id.to_hex().ends_with("0a"));
        assert_eq!(id.selector(), 10);

        bytes[31] = 0xff;
        assert_eq!(RecordId::from_bytes(bytes).selector(), 255);
    }

    #[test]
    fn test_record_id_serde_is_hex_text() {
        let id = RecordId::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_record_id_rejects_short_hex() {
        assert!(RecordId::from_hex("abcd").is_err());
        assert!(serde_json::from_str::<RecordId>("\"abcd\"").is_err());
    }

    #[test]
    fn test_bucket_derivation_is_stable() {
        let a = BucketId::derive(b"public key");
        let b = BucketId::derive(b"public key");
        let c = BucketId::derive(b"other key");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
