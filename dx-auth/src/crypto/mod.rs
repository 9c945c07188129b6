//! Cryptographic helpers for credential material
//!
//! Client secrets are kept as salted hashes and opaque tokens are only ever
//! stored by digest, so the credential store never holds a usable secret.

pub mod hashing;
pub mod keys;

pub use hashing::{SecretHash, token_digest};
pub use keys::generate_secure_token;
