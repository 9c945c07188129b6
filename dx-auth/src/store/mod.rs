//! Credential storage backend
//!
//! Persists OAuth2 clients, authorization codes and tokens. Codes and tokens
//! are addressed by their SHA256 digest (see [`crate::crypto::token_digest`]);
//! the raw values only ever exist in responses to the caller.
//!
//! Operations that gate single-use semantics (code redemption, refresh
//! rotation) are check-and-set primitives: an implementation must perform the
//! whole check and the state change as one atomic step.

pub mod memory;

pub use memory::InMemoryCredentialStore;

use crate::crypto::SecretHash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Client already exists: {0}")]
    ClientExists(String),

    #[error("Authorization code not found")]
    CodeNotFound,

    #[error("Authorization code already used")]
    CodeAlreadyUsed,

    #[error("Authorization code expired")]
    CodeExpired,

    #[error("Authorization code was issued to another client")]
    CodeClientMismatch,

    #[error("Authorization code was issued for another redirect URI")]
    CodeRedirectMismatch,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token is no longer active")]
    TokenInactive,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token was issued to another client")]
    TokenClientMismatch,

    #[error("Token has the wrong type")]
    TokenKindMismatch,

    #[error("Storage error: {0}")]
    General(String),
}

/// Registered OAuth2 client as stored
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: String,
    pub secret: SecretHash,
    pub name: String,
    pub description: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Issued authorization code as stored
#[derive(Debug, Clone)]
pub struct AuthorizationCodeRecord {
    pub code_digest: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// Token type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Issued access or refresh token as stored
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token_digest: String,
    pub kind: TokenKind,
    pub client_id: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// Digest of the paired token (refresh ↔ access)
    pub related_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Conditions a code must satisfy to be redeemed
#[derive(Debug, Clone, Copy)]
pub struct CodeRedemption<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub now: DateTime<Utc>,
}

/// Conditions a refresh token must satisfy to be rotated
#[derive(Debug, Clone, Copy)]
pub struct RefreshRotation<'a> {
    pub client_id: &'a str,
    pub now: DateTime<Utc>,
}

/// Counts removed by [`CredentialStore::purge_expired`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub codes: usize,
    pub tokens: usize,
}

/// Credential storage backend trait
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Client operations
    async fn insert_client(&self, client: ClientRecord) -> Result<(), StoreError>;
    /// Fetch a client regardless of its active flag
    async fn get_client(&self, client_id: &str) -> Result<ClientRecord, StoreError>;
    async fn set_client_active(&self, client_id: &str, active: bool) -> Result<(), StoreError>;

    // Authorization code operations
    async fn insert_code(&self, code: AuthorizationCodeRecord) -> Result<(), StoreError>;
    /// Atomically check a code against `redemption` and mark it used.
    ///
    /// Exactly one of any number of concurrent calls for the same code can
    /// succeed.
    async fn consume_code(
        &self,
        code_digest: &str,
        redemption: CodeRedemption<'_>,
    ) -> Result<AuthorizationCodeRecord, StoreError>;

    // Token operations
    /// Store an access token, optionally with its paired refresh token
    async fn insert_tokens(
        &self,
        access: TokenRecord,
        refresh: Option<TokenRecord>,
    ) -> Result<(), StoreError>;
    async fn get_token(&self, token_digest: &str) -> Result<TokenRecord, StoreError>;
    /// Atomically check a refresh token, deactivate it and its paired access
    /// token, and store the replacement pair. Returns the retired refresh
    /// token.
    async fn rotate_refresh_token(
        &self,
        refresh_digest: &str,
        rotation: RefreshRotation<'_>,
        access: TokenRecord,
        refresh: TokenRecord,
    ) -> Result<TokenRecord, StoreError>;
    /// Deactivate a token and its pair; returns how many were deactivated
    async fn deactivate_token(&self, token_digest: &str) -> Result<usize, StoreError>;
    async fn deactivate_user_tokens(&self, user_id: &str) -> Result<usize, StoreError>;
    async fn deactivate_client_tokens(&self, client_id: &str) -> Result<usize, StoreError>;

    // Maintenance
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats, StoreError>;
}
