//! Chunked asymmetric encryption.
//!
//! RSA-OAEP(SHA-256) can only encrypt a short block, so the plaintext is
//! split into blocks of at most `modulus_bytes - 66` bytes. Each block is
//! encrypted on its own into exactly `modulus_bytes` of ciphertext, and the
//! blocks are concatenated in order and base64-encoded.
//!
//! ```text
//! plaintext:  [ 446 ][ 446 ][ 446 ][ 446 ][ 216 ]      2000 bytes
//! ciphertext: [ 512 ][ 512 ][ 512 ][ 512 ][ 512 ]      2560 bytes
//! ```
//!
//! An empty plaintext is still one (empty) block, so decryption is an exact
//! inverse for every input.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::try_join_all;

use tessera_core::Record;

use crate::error::{MailError, Result};
use crate::keys::{EncryptionPrivateKey, EncryptionPublicKey};

/// Encrypt to raw concatenated blocks.
pub fn encrypt_bytes(key: &EncryptionPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let safe = key.safe_block_len();
    if safe == 0 {
        return Err(MailError::InvalidKey("modulus too small for OAEP".into()));
    }

    let block_count = plaintext.len().div_ceil(safe).max(1);
    let mut out = Vec::with_capacity(block_count * key.output_block_len());

    if plaintext.is_empty() {
        out.extend(key.encrypt_block(&[])?);
    } else {
        for block in plaintext.chunks(safe) {
            out.extend(key.encrypt_block(block)?);
        }
    }
    Ok(out)
}

/// Encrypt and base64-encode.
pub fn encrypt(key: &EncryptionPublicKey, plaintext: &[u8]) -> Result<String> {
    Ok(STANDARD.encode(encrypt_bytes(key, plaintext)?))
}

/// Decrypt raw concatenated blocks on the current thread.
pub fn decrypt_bytes(key: &EncryptionPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let block = check_shape(key, ciphertext)?;
    let mut out = Vec::with_capacity(ciphertext.len());
    for chunk in ciphertext.chunks(block) {
        out.extend(key.decrypt_block(chunk)?);
    }
    Ok(out)
}

/// Decode and decrypt, one blocking task per block, reassembled in order.
pub async fn decrypt(key: &EncryptionPrivateKey, ciphertext: &str) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| MailError::Malformed(e.to_string()))?;
    let block = check_shape(key, &raw)?;

    let tasks = raw.chunks(block).map(|chunk| {
        let key = key.clone();
        let chunk = chunk.to_vec();
        tokio::task::spawn_blocking(move || key.decrypt_block(&chunk))
    });
    let blocks = try_join_all(tasks)
        .await
        .map_err(|e| MailError::Task(e.to_string()))?;

    let mut out = Vec::with_capacity(raw.len());
    for block in blocks {
        out.extend(block?);
    }
    Ok(out)
}

/// Serialize a record as JSON and encrypt it.
pub fn seal_record(key: &EncryptionPublicKey, record: &Record) -> Result<String> {
    let json = serde_json::to_vec(record).map_err(|e| MailError::Payload(e.to_string()))?;
    encrypt(key, &json)
}

/// Decrypt, decode as UTF-8, and parse the JSON record inside.
pub async fn open_record(key: &EncryptionPrivateKey, ciphertext: &str) -> Result<Record> {
    let plaintext = decrypt(key, ciphertext).await?;
    let text = String::from_utf8(plaintext).map_err(|e| MailError::Payload(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| MailError::Payload(e.to_string()))
}

fn check_shape(key: &EncryptionPrivateKey, ciphertext: &[u8]) -> Result<usize> {
    let block = key.output_block_len();
    if ciphertext.is_empty() || ciphertext.len() % block != 0 {
        return Err(MailError::Malformed(format!(
            "{} bytes is not a whole number of {}-byte blocks",
            ciphertext.len(),
            block
        )));
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_keys::{full, other, small};
    use tessera_core::{BucketId, RecordBuilder};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_2000_bytes_in_five_blocks() {
        let pair = full();
        let plaintext: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();

        let raw = encrypt_bytes(&pair.public, &plaintext).unwrap();
        assert_eq!(raw.len(), 5 * 512);

        let encoded = STANDARD.encode(&raw);
        assert_eq!(decrypt(&pair.private, &encoded).await.unwrap(), plaintext);
    }

    #[tokio::test]
    async fn test_empty_plaintext_roundtrip() {
        let pair = small();
        let ct = encrypt(&pair.public, b"").unwrap();
        assert_eq!(STANDARD.decode(&ct).unwrap().len(), 256);
        assert!(decrypt(&pair.private, &ct).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_block_boundaries() {
        let pair = small();
        let safe = pair.public.safe_block_len();
        for len in [1, safe - 1, safe, safe + 1, 3 * safe] {
            let plaintext = vec![0xa5u8; len];
            let raw = encrypt_bytes(&pair.public, &plaintext).unwrap();
            assert_eq!(raw.len(), len.div_ceil(safe) * 256, "len {}", len);
            assert_eq!(decrypt_bytes(&pair.private, &raw).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let pair = small();
        let a = encrypt(&pair.public, b"same").unwrap();
        let b = encrypt(&pair.public, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let ct = encrypt(&small().public, b"secret").unwrap();
        assert!(matches!(
            decrypt(&other().private, &ct).await,
            Err(MailError::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_ciphertext() {
        let key = &small().private;
        assert!(matches!(decrypt(key, "!!!").await, Err(MailError::Malformed(_))));
        assert!(matches!(decrypt(key, "").await, Err(MailError::Malformed(_))));
        let short = STANDARD.encode([0u8; 100]);
        assert!(matches!(decrypt(key, &short).await, Err(MailError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_record_roundtrip() {
        let pair = small();
        let record = RecordBuilder::message("hello there ✉")
            .timestamp(1_700_000_000)
            .recipient(BucketId::derive(b"k"))
            .build();
        let ct = seal_record(&pair.public, &record).unwrap();
        assert_eq!(open_record(&pair.private, &ct).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_non_json_payload_is_parse_error() {
        let pair = small();
        let ct = encrypt(&pair.public, b"not json").unwrap();
        let err = open_record(&pair.private, &ct).await.unwrap_err();
        assert!(err.is_parse_error());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use tessera_testkit::generators::plaintext;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn prop_decrypt_inverts_encrypt(p in plaintext(600)) {
                let pair = small();
                let raw = encrypt_bytes(&pair.public, &p).unwrap();
                prop_assert_eq!(raw.len() % 256, 0);
                prop_assert_eq!(decrypt_bytes(&pair.private, &raw).unwrap(), p);
            }
        }
    }
}
