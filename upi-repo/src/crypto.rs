//! Field-level encryption for data at rest.
//!
//! Account numbers, Aadhaar and PAN are stored as AES-256-GCM ciphertext.
//! Each value gets a fresh random 96-bit nonce; the stored form is
//! `hex(nonce):hex(ciphertext)`. Equality lookups over encrypted columns go
//! through a SHA-256 digest column instead of the ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use upi_types::RepoError;

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for sensitive columns.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    /// Builds a cipher from a 64-character hex key (32 bytes).
    pub fn from_hex_key(hex_key: &str) -> Result<Self, RepoError> {
        let bytes = hex::decode(hex_key).map_err(|e| RepoError::Crypto(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(RepoError::Crypto(
                "encryption key must be 64 hex characters (32 bytes)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypts a field value. Output is `hex(nonce):hex(ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, RepoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| RepoError::Crypto(e.to_string()))?;

        Ok(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypts a stored `hex(nonce):hex(ciphertext)` value.
    pub fn decrypt(&self, stored: &str) -> Result<String, RepoError> {
        let (nonce_hex, ct_hex) = stored
            .split_once(':')
            .ok_or_else(|| RepoError::Crypto("malformed encrypted field".to_string()))?;

        let nonce_bytes = hex::decode(nonce_hex).map_err(|e| RepoError::Crypto(e.to_string()))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(RepoError::Crypto("bad nonce length".to_string()));
        }
        let ciphertext = hex::decode(ct_hex).map_err(|e| RepoError::Crypto(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| RepoError::Crypto(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| RepoError::Crypto(e.to_string()))
    }
}

/// SHA-256 digest of a field value, hex-encoded. Used for uniqueness checks
/// and lookups over encrypted columns.
pub fn field_digest(value: &str) -> String {
    let hash = Sha256::digest(value.as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = FieldCipher::from_hex_key(TEST_KEY).unwrap();

        let stored = cipher.encrypt("123456789012").unwrap();
        assert!(stored.contains(':'));
        assert_ne!(stored, "123456789012");

        let plain = cipher.decrypt(&stored).unwrap();
        assert_eq!(plain, "123456789012");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = FieldCipher::from_hex_key(TEST_KEY).unwrap();

        let a = cipher.encrypt("same value").unwrap();
        let b = cipher.encrypt("same value").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = FieldCipher::from_hex_key(TEST_KEY).unwrap();
        let other = FieldCipher::from_hex_key(
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .unwrap();

        let stored = cipher.encrypt("secret").unwrap();
        assert!(other.decrypt(&stored).is_err());
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(FieldCipher::from_hex_key("deadbeef").is_err());
        assert!(FieldCipher::from_hex_key("not hex at all").is_err());
    }

    #[test]
    fn test_rejects_malformed_stored_value() {
        let cipher = FieldCipher::from_hex_key(TEST_KEY).unwrap();
        assert!(cipher.decrypt("no-separator").is_err());
        assert!(cipher.decrypt("abcd:zzzz").is_err());
    }

    #[test]
    fn test_field_digest_is_deterministic() {
        assert_eq!(field_digest("123456789012"), field_digest("123456789012"));
        assert_ne!(field_digest("123456789012"), field_digest("123456789013"));
        assert_eq!(field_digest("x").len(), 64);
    }
}
