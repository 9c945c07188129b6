//! PKCE (Proof Key for Code Exchange), RFC 7636
//!
//! Optional on `/oauth2/authorize`. When a client sends a challenge, the
//! matching verifier is mandatory at the token endpoint. Only the S256
//! method is accepted.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The only supported `code_challenge_method`
pub const METHOD_S256: &str = "S256";

/// Challenge recorded alongside an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub challenge: String,
    pub method: String,
}

impl PkceChallenge {
    /// Build from the authorize query parameters.
    ///
    /// Returns `Ok(None)` when no challenge was sent. A missing method
    /// defaults to S256.
    pub fn from_params(
        challenge: Option<&str>,
        method: Option<&str>,
    ) -> Result<Option<Self>, &'static str> {
        let challenge = match challenge.filter(|c| !c.is_empty()) {
            Some(challenge) => challenge,
            None if method.is_some_and(|m| !m.is_empty()) => {
                return Err("code_challenge_method requires code_challenge");
            }
            None => return Ok(None),
        };

        let method = method.filter(|m| !m.is_empty()).unwrap_or(METHOD_S256);
        if method != METHOD_S256 {
            return Err("code_challenge_method must be 'S256'");
        }
        if !validate_code_challenge(challenge) {
            return Err("Invalid code_challenge format");
        }

        Ok(Some(Self {
            challenge: challenge.to_string(),
            method: method.to_string(),
        }))
    }
}

/// BASE64URL(SHA256(ASCII(code_verifier)))
pub fn derive_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    base64_url::encode(&hash)
}

/// Verify a code_verifier against a stored S256 challenge
pub fn verify_pkce(code_verifier: &str, code_challenge: &str) -> bool {
    if !validate_code_verifier(code_verifier) {
        return false;
    }

    let computed = derive_challenge(code_verifier);
    if computed.len() != code_challenge.len() {
        return false;
    }
    computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}

/// RFC 7636 §4.1: 43-128 characters of `[A-Za-z0-9-._~]`
pub fn validate_code_verifier(code_verifier: &str) -> bool {
    (43..=128).contains(&code_verifier.len())
        && code_verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// S256 challenges are unpadded base64url, 43-128 characters
pub fn validate_code_challenge(code_challenge: &str) -> bool {
    (43..=128).contains(&code_challenge.len())
        && code_challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
