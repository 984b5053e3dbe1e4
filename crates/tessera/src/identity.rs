//! Local identities.
//!
//! An identity is an Ed25519 signing keypair, an RSA encryption keypair, and
//! a tripcode label. It lives only in the local settings blob; records carry
//! the signing public key and mailboxes are named after the encryption
//! public key.

use serde::{Deserialize, Serialize};

use tessera_core::{BucketId, Ed25519PublicKey, Keypair};
use tessera_mail::{EncryptionKeypair, MailError};

use crate::error::{BoardError, Result};

/// A usable identity with all key material parsed.
#[derive(Clone)]
pub struct Identity {
    tripcode: String,
    signing: Keypair,
    encryption: EncryptionKeypair,
}

impl Identity {
    /// Generate fresh keys with an empty tripcode.
    ///
    /// RSA generation is slow; call from a blocking context.
    pub fn generate(rsa_bits: usize) -> std::result::Result<Self, MailError> {
        Ok(Self {
            tripcode: String::new(),
            signing: Keypair::generate(),
            encryption: EncryptionKeypair::generate(rsa_bits)?,
        })
    }

    pub fn tripcode(&self) -> &str {
        &self.tripcode
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.signing.public_key()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.signing
    }

    pub fn encryption(&self) -> &EncryptionKeypair {
        &self.encryption
    }

    /// The mailbox this identity receives messages in.
    pub fn bucket(&self) -> Result<BucketId> {
        Ok(self.encryption.public.bucket()?)
    }

    /// Export all four keys in their persisted form.
    pub fn to_stored(&self) -> Result<StoredIdentity> {
        Ok(StoredIdentity {
            tripcode: self.tripcode.clone(),
            pub_key: self.signing.public_key().to_hex(),
            priv_key: self.signing.secret_hex(),
            enc_pub_key: Some(self.encryption.public.to_pem()?),
            enc_priv_key: Some(self.encryption.private.to_pem()?),
        })
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("tripcode", &self.tripcode)
            .field("public_key", &self.signing.public_key())
            .finish()
    }
}

/// An identity as persisted in the settings blob.
///
/// Ed25519 keys are hex; RSA keys are PEM. Identities created before
/// messaging existed have no encryption keys and are upgraded on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    #[serde(default)]
    pub tripcode: String,
    pub pub_key: String,
    pub priv_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_priv_key: Option<String>,
}

impl StoredIdentity {
    pub fn needs_encryption_keys(&self) -> bool {
        self.enc_pub_key.is_none() || self.enc_priv_key.is_none()
    }

    /// Whether this entry is the identity with signing key `pub_key`.
    pub fn is(&self, pub_key: &Ed25519PublicKey) -> bool {
        self.pub_key.eq_ignore_ascii_case(&pub_key.to_hex())
    }

    /// Parse the key material, checking that each pair belongs together.
    pub fn load(&self) -> Result<Identity> {
        let signing = Keypair::from_secret_hex(&self.priv_key)?;
        let claimed = Ed25519PublicKey::from_hex(&self.pub_key)?;
        if signing.public_key() != claimed {
            return Err(BoardError::Identity(format!(
                "signing key {} does not match its secret",
                self.pub_key
            )));
        }

        let (Some(private), Some(public)) = (&self.enc_priv_key, &self.enc_pub_key) else {
            return Err(BoardError::Identity(format!(
                "identity {} has no encryption keys",
                self.pub_key
            )));
        };
        let encryption = EncryptionKeypair::from_pems(private, public)?;

        Ok(Identity {
            tripcode: self.tripcode.clone(),
            signing,
            encryption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_roundtrip() {
        let identity = Identity::generate(1024).unwrap();
        let stored = identity.to_stored().unwrap();
        assert!(!stored.needs_encryption_keys());
        assert!(stored.is(&identity.public_key()));

        let loaded = stored.load().unwrap();
        assert_eq!(loaded.public_key(), identity.public_key());
        assert_eq!(loaded.bucket().unwrap(), identity.bucket().unwrap());
    }

    #[test]
    fn test_json_field_names() {
        let stored = StoredIdentity {
            tripcode: "!abc".into(),
            pub_key: "00".into(),
            priv_key: "11".into(),
            enc_pub_key: None,
            enc_priv_key: None,
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["pubKey"], "00");
        assert_eq!(json["privKey"], "11");
        assert!(json.get("encPubKey").is_none());

        let legacy: StoredIdentity =
            serde_json::from_str(r#"{"pubKey":"00","privKey":"11"}"#).unwrap();
        assert!(legacy.needs_encryption_keys());
        assert_eq!(legacy.tripcode, "");
    }

    #[test]
    fn test_mismatched_signing_key_rejected() {
        let identity = Identity::generate(1024).unwrap();
        let mut stored = identity.to_stored().unwrap();
        stored.pub_key = Keypair::from_seed(&[9; 32]).public_key().to_hex();
        assert!(matches!(stored.load(), Err(BoardError::Identity(_))));
    }

    #[test]
    fn test_missing_encryption_keys_rejected() {
        let mut stored = Identity::generate(1024).unwrap().to_stored().unwrap();
        stored.enc_priv_key = None;
        assert!(matches!(stored.load(), Err(BoardError::Identity(_))));
    }
}
