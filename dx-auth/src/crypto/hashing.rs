//! Secure hashing for client secrets and opaque tokens
//!
//! Secrets use SHA256 over `secret:salt` with a per-client random salt and are
//! verified in constant time. Tokens and authorization codes are high-entropy
//! random values, so an unsalted SHA256 digest is enough to index them.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Salt for secret hashing (32 bytes = 256 bits)
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; 32]);

impl Default for Salt {
    fn default() -> Self {
        Self::new()
    }
}

impl Salt {
    /// Create a new random salt
    pub fn new() -> Self {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        Salt(salt)
    }

    /// Convert salt to base64 string
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Salted hash of a client secret
#[derive(Clone)]
pub struct SecretHash {
    salt: Salt,
    hash: String,
}

impl SecretHash {
    /// Hash a freshly generated secret with a new salt
    pub fn new(secret: &str) -> Self {
        let salt = Salt::new();
        let hash = hash_with_salt(secret, &salt);
        Self { salt, hash }
    }

    /// Check a presented secret against the stored hash
    pub fn verify(&self, candidate: &str) -> bool {
        let computed = hash_with_salt(candidate, &self.salt);
        let stored = self.hash.as_bytes();
        let computed = computed.as_bytes();

        if stored.len() != computed.len() {
            return false;
        }

        stored.ct_eq(computed).into()
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(..)")
    }
}

fn hash_with_salt(secret: &str, salt: &Salt) -> String {
    let salted = format!("{}:{}", secret, salt.to_base64());

    let mut hasher = Sha256::new();
    hasher.update(salted.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Lookup digest for an opaque token or authorization code
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_verification() {
        let hash = SecretHash::new("s3cr3t-value");

        assert!(hash.verify("s3cr3t-value"));
        assert!(!hash.verify("s3cr3t-valuf"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn test_same_secret_different_salt() {
        let a = SecretHash::new("same");
        let b = SecretHash::new("same");

        assert_ne!(a.hash, b.hash);
        assert!(a.verify("same"));
        assert!(b.verify("same"));
    }

    #[test]
    fn test_token_digest_is_stable() {
        let d1 = token_digest("abc");
        let d2 = token_digest("abc");

        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert_ne!(d1, token_digest("abd"));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let hash = SecretHash::new("hidden");
        assert_eq!(format!("{hash:?}"), "SecretHash(..)");
    }
}
