//! Random credential generation
//!
//! Codes, tokens and client secrets are URL-safe base64 strings without
//! padding. The alphabet never contains `.`, so an opaque token can not be
//! mistaken for a compact JWT.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// Bytes of randomness behind every opaque credential (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Generate an opaque credential of `bytes` random bytes
pub fn generate_secure_token(bytes: usize) -> String {
    let mut key_bytes = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut key_bytes);

    URL_SAFE_NO_PAD.encode(&key_bytes)
}
