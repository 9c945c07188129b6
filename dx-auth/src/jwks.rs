//! JWKS fetching and key caching
//!
//! The cache holds one snapshot (`kid` → decoding key, plus the instant it
//! was fetched). Refreshing fetches the whole set outside any lock and swaps
//! the snapshot in a single write.

use crate::config::JwtConfig;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to fetch JWKS: {0}")]
    Fetch(String),

    #[error("Invalid JWKS document: {0}")]
    Parse(String),

    #[error("JWKS contains no usable signing keys")]
    NoUsableKeys,

    #[error("Key not found: {kid}")]
    KeyNotFound { kid: String },
}

/// JSON Web Key Set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// JSON Web Key (RSA members only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(rename = "use", default)]
    pub key_use: Option<String>,

    /// RSA modulus, base64url
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent, base64url
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA"
    }

    /// `use` is `sig` or absent
    pub fn is_signature_key(&self) -> bool {
        self.key_use.as_deref().is_none_or(|u| u == "sig")
    }

    /// Rebuild the RSA public key from its modulus and exponent
    pub fn to_decoding_key(&self) -> Result<DecodingKey, JwksError> {
        if !self.is_rsa() {
            return Err(JwksError::Parse(format!("Unsupported key type: {}", self.kty)));
        }

        let n = self
            .n
            .as_deref()
            .ok_or_else(|| JwksError::Parse("Missing RSA modulus (n)".to_string()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| JwksError::Parse("Missing RSA exponent (e)".to_string()))?;

        let exponent = URL_SAFE_NO_PAD
            .decode(e.trim_end_matches('='))
            .map_err(|err| JwksError::Parse(format!("Invalid RSA exponent: {err}")))?;
        if exponent_below_two(&exponent) {
            return Err(JwksError::Parse("RSA exponent must be at least 2".to_string()));
        }

        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| JwksError::Parse(format!("Invalid RSA key: {err}")))
    }
}

/// Big-endian exponent bytes encode a value < 2
fn exponent_below_two(bytes: &[u8]) -> bool {
    match bytes.iter().position(|b| *b != 0) {
        None => true,
        Some(first) => first == bytes.len() - 1 && bytes[first] < 2,
    }
}

/// Turn a key set into the usable signing keys, skipping anything malformed
pub fn usable_keys(jwks: &Jwks) -> Result<HashMap<String, Arc<DecodingKey>>, JwksError> {
    let mut keys = HashMap::new();

    for jwk in &jwks.keys {
        if !jwk.is_rsa() || !jwk.is_signature_key() {
            debug!(kty = %jwk.kty, key_use = ?jwk.key_use, "Skipping non-signing JWK");
            continue;
        }
        let Some(kid) = jwk.kid.as_deref().filter(|k| !k.is_empty()) else {
            warn!("Skipping JWK without kid");
            continue;
        };
        match jwk.to_decoding_key() {
            Ok(key) => {
                keys.insert(kid.to_string(), Arc::new(key));
            }
            Err(e) => warn!(kid = %kid, "Skipping unusable JWK: {}", e),
        }
    }

    if keys.is_empty() {
        return Err(JwksError::NoUsableKeys);
    }
    Ok(keys)
}

#[derive(Default)]
struct KeySnapshot {
    keys: HashMap<String, Arc<DecodingKey>>,
    last_fetch: Option<Instant>,
}

impl KeySnapshot {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.keys.is_empty() || self.last_fetch.is_none_or(|at| at.elapsed() >= ttl)
    }
}

/// Cached view of the identity provider's signing keys
pub struct KeyCache {
    jwks_url: String,
    client: Client,
    ttl: Duration,
    snapshot: RwLock<KeySnapshot>,
}

impl KeyCache {
    pub fn new(config: &JwtConfig) -> Result<Self, JwksError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;

        Ok(Self {
            jwks_url: config.jwks_url.clone(),
            client,
            ttl: config.cache_ttl(),
            snapshot: RwLock::new(KeySnapshot::default()),
        })
    }

    /// Cache preloaded with `keys`, treated as freshly fetched
    pub fn with_keys(
        config: &JwtConfig,
        keys: HashMap<String, Arc<DecodingKey>>,
    ) -> Result<Self, JwksError> {
        let cache = Self::new(config)?;
        Ok(Self {
            snapshot: RwLock::new(KeySnapshot {
                keys,
                last_fetch: Some(Instant::now()),
            }),
            ..cache
        })
    }

    /// Download and parse the key set
    pub async fn fetch_jwks(&self) -> Result<HashMap<String, Arc<DecodingKey>>, JwksError> {
        info!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Fetch(format!("HTTP {}", response.status())));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| JwksError::Parse(e.to_string()))?;

        usable_keys(&jwks)
    }

    /// Replace the snapshot with a freshly fetched key set
    pub async fn refresh(&self) -> Result<usize, JwksError> {
        let keys = self.fetch_jwks().await?;
        let count = keys.len();

        let mut snapshot = self.snapshot.write().await;
        *snapshot = KeySnapshot {
            keys,
            last_fetch: Some(Instant::now()),
        };

        info!(key_count = count, "JWKS cache refreshed");
        Ok(count)
    }

    /// Resolve a signing key, refreshing when the cache is empty, stale, or
    /// does not know `kid`. At most one refresh per call.
    pub async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, JwksError> {
        let cached = {
            let snapshot = self.snapshot.read().await;
            if !snapshot.is_stale(self.ttl) {
                if let Some(key) = snapshot.keys.get(kid) {
                    return Ok(Arc::clone(key));
                }
            }
            snapshot.keys.get(kid).cloned()
        };

        match self.refresh().await {
            Ok(_) => {}
            Err(e) => {
                // A stale key beats no key while the provider is unreachable
                if let Some(key) = cached {
                    warn!(kid = %kid, "JWKS refresh failed, using cached key: {}", e);
                    return Ok(key);
                }
                return Err(e);
            }
        }

        self.snapshot
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    /// Key count and last fetch time, read from one snapshot
    pub async fn snapshot_stats(&self) -> (usize, Option<Instant>) {
        let snapshot = self.snapshot.read().await;
        (snapshot.keys.len(), snapshot.last_fetch)
    }

    pub async fn key_count(&self) -> usize {
        self.snapshot_stats().await.0
    }

    pub async fn last_fetch(&self) -> Option<Instant> {
        self.snapshot_stats().await.1
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("jwks_url", &self.jwks_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
