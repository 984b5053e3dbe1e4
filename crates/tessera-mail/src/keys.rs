//! RSA encryption keys.
//!
//! Encryption keys travel as PEM: PKCS#8 for the private half, SPKI for the
//! public half. A mailbox bucket is the digest of the public key's SPKI DER
//! encoding, so it is stable however the PEM is wrapped.

use std::fmt;
use std::sync::Arc;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use tessera_core::BucketId;

use crate::error::{MailError, Result};

/// Default modulus size.
pub const DEFAULT_MODULUS_BITS: usize = 4096;

/// Smallest modulus accepted for new keys.
pub const MIN_MODULUS_BITS: usize = 1024;

/// OAEP overhead per block for SHA-256: two digests plus two bytes.
pub const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

/// The public half: encrypts, and names the mailbox.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionPublicKey {
    inner: RsaPublicKey,
}

impl EncryptionPublicKey {
    /// Parse from SPKI PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_pem(pem.trim())
            .map_err(|e| MailError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Export as SPKI PEM.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| MailError::InvalidKey(e.to_string()))
    }

    /// The mailbox label for this key.
    pub fn bucket(&self) -> Result<BucketId> {
        let der = self
            .inner
            .to_public_key_der()
            .map_err(|e| MailError::InvalidKey(e.to_string()))?;
        Ok(BucketId::derive(der.as_bytes()))
    }

    /// Modulus size in bytes; also the size of every ciphertext block.
    pub fn output_block_len(&self) -> usize {
        self.inner.size()
    }

    /// Largest plaintext block that fits one OAEP-SHA256 encryption.
    pub fn safe_block_len(&self) -> usize {
        self.output_block_len().saturating_sub(OAEP_SHA256_OVERHEAD)
    }

    /// Encrypt one block. `block` must not exceed [`safe_block_len`](Self::safe_block_len).
    pub(crate) fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        self.inner
            .encrypt(&mut rng, Oaep::new::<Sha256>(), block)
            .map_err(|e| MailError::Encryption(e.to_string()))
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionPublicKey({} bits)", self.inner.n().bits())
    }
}

/// The private half. Cheap to clone; blocks are decrypted on worker threads.
#[derive(Clone)]
pub struct EncryptionPrivateKey {
    inner: Arc<RsaPrivateKey>,
}

impl EncryptionPrivateKey {
    /// Generate a new key. Slow for large moduli; call from a blocking context.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_MODULUS_BITS {
            return Err(MailError::InvalidKey(format!(
                "modulus of {} bits is below the minimum of {}",
                bits, MIN_MODULUS_BITS
            )));
        }
        let mut rng = rand::thread_rng();
        let inner =
            RsaPrivateKey::new(&mut rng, bits).map_err(|e| MailError::InvalidKey(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Parse from PKCS#8 PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| MailError::InvalidKey(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Export as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| MailError::InvalidKey(e.to_string()))
    }

    pub fn public_key(&self) -> EncryptionPublicKey {
        EncryptionPublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    /// Modulus size in bytes.
    pub fn output_block_len(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt(Oaep::new::<Sha256>(), block)
            .map_err(|e| MailError::Decryption(e.to_string()))
    }
}

impl fmt::Debug for EncryptionPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionPrivateKey({} bits)", self.inner.n().bits())
    }
}

/// Both halves, as held by a local identity.
#[derive(Clone, Debug)]
pub struct EncryptionKeypair {
    pub private: EncryptionPrivateKey,
    pub public: EncryptionPublicKey,
}

impl EncryptionKeypair {
    /// Generate a new keypair. Slow for large moduli; call from a blocking context.
    pub fn generate(bits: usize) -> Result<Self> {
        Ok(Self::from_private(EncryptionPrivateKey::generate(bits)?))
    }

    pub fn from_private(private: EncryptionPrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Restore from exported PEMs, checking that the halves belong together.
    pub fn from_pems(private_pem: &str, public_pem: &str) -> Result<Self> {
        let private = EncryptionPrivateKey::from_pem(private_pem)?;
        let public = EncryptionPublicKey::from_pem(public_pem)?;
        if private.public_key() != public {
            return Err(MailError::InvalidKey(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { private, public })
    }
}
