//! Security utilities for PIN/token hashing, token generation and
//! notification signing.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hashes a UPI PIN using SHA-256.
pub fn hash_pin(pin: &str) -> String {
    let hash = Sha256::digest(pin.as_bytes());
    hex::encode(hash)
}

/// Verifies a PIN against a stored digest using constant-time comparison.
pub fn verify_pin(input: &str, stored_digest: &str) -> bool {
    let input_digest = hash_pin(input);
    input_digest.as_bytes().ct_eq(stored_digest.as_bytes()).into()
}

/// Hashes a bearer token using SHA-256. Tokens are stored digest-only.
pub fn hash_token(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

/// Generates a fresh bearer token. Shown to the caller exactly once;
/// only [`hash_token`] of it is ever persisted.
pub fn generate_token() -> String {
    let random_part: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("upi_{random_part}")
}

/// Signs a notification payload using HMAC-SHA256.
pub fn sign_notification(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a notification signature using constant-time comparison.
pub fn verify_notification_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_notification(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_hashing() {
        let pin = "4321";
        let digest = hash_pin(pin);

        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_pin(pin));
    }

    #[test]
    fn test_pin_verification() {
        let pin = "4321";
        let digest = hash_pin(pin);

        assert!(verify_pin(pin, &digest));
        assert!(!verify_pin("1234", &digest));
    }

    #[test]
    fn test_token_hashing() {
        let token = "tok_9f2a77c1";
        let digest = hash_token(token);

        assert_eq!(digest.len(), 64);
        assert_ne!(digest, hash_token("tok_other"));
    }

    #[test]
    fn test_token_generation() {
        let token = generate_token();

        assert!(token.starts_with("upi_"));
        assert_eq!(token.len(), 36);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_notification_signing() {
        let payload = br#"{"title":"Money received"}"#;
        let secret = "notify_secret_123";

        let signature = sign_notification(payload, secret);
        assert!(verify_notification_signature(payload, &signature, secret));
        assert!(!verify_notification_signature(
            payload,
            &signature,
            "wrong_secret"
        ));
        assert!(!verify_notification_signature(b"tampered", &signature, secret));
    }
}
