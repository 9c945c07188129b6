//! OAuth2 authorization engine
//!
//! Authorization-code, refresh-token and client-credentials grants over a
//! [`CredentialStore`]. Codes and tokens are opaque random strings; only their
//! digests are persisted. Refreshing rotates the pair: the presented refresh
//! token and its access token are retired in the same step that stores the
//! replacements.

use super::models::{
    AuthorizeRequest, Client, CreateClientRequest, IssuedTokens, OAuthError, OAuthErrorCode,
    RegisteredClient, TokenIdentity,
};
use super::pkce::{PkceChallenge, verify_pkce};
use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditSeverity};
use crate::config::OAuthConfig;
use crate::crypto::keys::TOKEN_BYTES;
use crate::crypto::{SecretHash, generate_secure_token, token_digest};
use crate::store::{
    AuthorizationCodeRecord, ClientRecord, CodeRedemption, CredentialStore,
    InMemoryCredentialStore, PurgeStats, RefreshRotation, StoreError, TokenKind, TokenRecord,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum OAuthEngineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid client: {0}")]
    InvalidClient(String),

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OAuthEngineError {
    /// Wire representation for OAuth2 endpoints
    pub fn to_oauth_error(&self) -> OAuthError {
        match self {
            OAuthEngineError::InvalidRequest(msg) => OAuthError::invalid_request(msg.clone()),
            OAuthEngineError::InvalidClient(msg) => OAuthError::invalid_client(msg.clone()),
            OAuthEngineError::ClientNotFound(_) => OAuthError::invalid_client("Invalid client_id"),
            OAuthEngineError::InvalidGrant(msg) => OAuthError::invalid_grant(msg.clone()),
            OAuthEngineError::InvalidScope(msg) => {
                OAuthError::new(OAuthErrorCode::InvalidScope, msg.clone())
            }
            OAuthEngineError::UnsupportedResponseType(msg) => {
                OAuthError::new(OAuthErrorCode::UnsupportedResponseType, msg.clone())
            }
            OAuthEngineError::TokenNotFound
            | OAuthEngineError::TokenExpired
            | OAuthEngineError::TokenRevoked => OAuthError::invalid_grant("Invalid or expired token"),
            OAuthEngineError::Store(_) | OAuthEngineError::Internal(_) => {
                OAuthError::new(OAuthErrorCode::ServerError, "Internal server error")
            }
        }
    }
}

pub type OAuthResult<T> = Result<T, OAuthEngineError>;

/// Authorization request that passed validation, awaiting an end user
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    pub client_id: String,
    /// Registered redirect URI, exactly as registered
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub pkce: Option<PkceChallenge>,
}

/// Parameters of an `authorization_code` grant
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: Option<&'a str>,
}

/// Parameters of a `refresh_token` grant
#[derive(Debug, Clone, Copy)]
pub struct RefreshExchange<'a> {
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

pub struct OAuthEngine {
    store: Arc<dyn CredentialStore>,
    config: OAuthConfig,
    audit: AuditLogger,
}

impl OAuthEngine {
    pub fn new(store: Arc<dyn CredentialStore>, config: OAuthConfig, audit: AuditLogger) -> Self {
        Self {
            store,
            config,
            audit,
        }
    }

    /// Engine over a fresh in-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryCredentialStore::new()),
            OAuthConfig::default(),
            AuditLogger::tracing(),
        )
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    // ========================================================================
    // Clients
    // ========================================================================

    /// Register a client. The returned secret is never available again.
    pub async fn create_client(&self, request: CreateClientRequest) -> OAuthResult<RegisteredClient> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(OAuthEngineError::InvalidRequest("name is required".to_string()));
        }

        let redirect_uri = request.redirect_uri.trim();
        if redirect_uri.is_empty() {
            return Err(OAuthEngineError::InvalidRequest(
                "redirect_uri is required".to_string(),
            ));
        }
        Url::parse(redirect_uri).map_err(|_| {
            OAuthEngineError::InvalidRequest("redirect_uri must be an absolute URL".to_string())
        })?;

        let scopes = if request.scopes.is_empty() {
            self.config.default_scopes.clone()
        } else {
            dedup_scopes(request.scopes.iter().map(String::as_str))
        };

        let client_id = format!("client_{}", uuid::Uuid::new_v4());
        let client_secret = generate_secure_token(TOKEN_BYTES);
        let now = Utc::now();

        let record = ClientRecord {
            client_id: client_id.clone(),
            secret: SecretHash::new(&client_secret),
            name: name.to_string(),
            description: request.description,
            redirect_uri: redirect_uri.to_string(),
            scopes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_client(record.clone()).await?;

        info!(client_id = %client_id, name = %record.name, "OAuth client created");
        self.audit.record(
            AuditEvent::new(AuditEventType::ClientCreated, AuditSeverity::Info, "OAuth client created")
                .with_resource(client_id.as_str())
                .with_metadata("redirect_uri", json!(record.redirect_uri)),
        );

        Ok(RegisteredClient {
            client: Client::from(&record),
            client_secret,
        })
    }

    /// Active client by id
    pub async fn get_client(&self, client_id: &str) -> OAuthResult<Client> {
        match self.store.get_client(client_id).await {
            Ok(record) if record.is_active => Ok(Client::from(&record)),
            Ok(_) | Err(StoreError::ClientNotFound(_)) => {
                Err(OAuthEngineError::ClientNotFound(client_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-enable or soft-disable a client. Disabling revokes its tokens.
    pub async fn set_client_active(&self, client_id: &str, active: bool) -> OAuthResult<()> {
        self.store
            .set_client_active(client_id, active)
            .await
            .map_err(|e| match e {
                StoreError::ClientNotFound(id) => OAuthEngineError::ClientNotFound(id),
                other => other.into(),
            })?;

        let event_type = if active {
            AuditEventType::ClientEnabled
        } else {
            let revoked = self.store.deactivate_client_tokens(client_id).await?;
            info!(client_id = %client_id, revoked, "OAuth client disabled");
            AuditEventType::ClientDisabled
        };

        self.audit.record(
            AuditEvent::new(event_type, AuditSeverity::Info, "OAuth client status changed")
                .with_resource(client_id),
        );
        Ok(())
    }

    /// Check client credentials. Every failure reads the same to the caller.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> OAuthResult<ClientRecord> {
        let invalid = || OAuthEngineError::InvalidClient("Invalid client credentials".to_string());

        let record = match self.store.get_client(client_id).await {
            Ok(record) => record,
            Err(StoreError::ClientNotFound(_)) => {
                debug!(client_id = %client_id, "Unknown client");
                return Err(invalid());
            }
            Err(e) => return Err(e.into()),
        };

        if !record.is_active || !record.secret.verify(client_secret) {
            warn!(client_id = %client_id, "Client authentication failed");
            self.audit.record(
                AuditEvent::new(
                    AuditEventType::AuthFailure,
                    AuditSeverity::Warning,
                    "Client authentication failed",
                )
                .with_actor(client_id),
            );
            return Err(invalid());
        }

        Ok(record)
    }

    // ========================================================================
    // Authorization endpoint
    // ========================================================================

    /// Validate an authorization request before an end user is resolved
    pub async fn validate_authorization(
        &self,
        request: &AuthorizeRequest,
    ) -> OAuthResult<ValidatedAuthorization> {
        if request.response_type != "code" {
            return Err(OAuthEngineError::UnsupportedResponseType(
                "Only 'code' response type is supported".to_string(),
            ));
        }
        if request.client_id.is_empty() {
            return Err(OAuthEngineError::InvalidRequest("client_id is required".to_string()));
        }
        if request.redirect_uri.is_empty() {
            return Err(OAuthEngineError::InvalidRequest(
                "redirect_uri is required".to_string(),
            ));
        }

        let client = match self.store.get_client(&request.client_id).await {
            Ok(client) if client.is_active => client,
            Ok(_) | Err(StoreError::ClientNotFound(_)) => {
                return Err(OAuthEngineError::ClientNotFound(request.client_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if client.redirect_uri != request.redirect_uri {
            warn!(client_id = %client.client_id, "redirect_uri mismatch on authorize");
            return Err(OAuthEngineError::InvalidRequest(
                "redirect_uri does not match the registered redirect URI".to_string(),
            ));
        }
        Url::parse(&request.redirect_uri)
            .map_err(|_| OAuthEngineError::InvalidRequest("Invalid redirect_uri".to_string()))?;

        let pkce = PkceChallenge::from_params(
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        )
        .map_err(|msg| OAuthEngineError::InvalidRequest(msg.to_string()))?;

        let scopes = match request.scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => dedup_scopes(scope.split_whitespace()),
            _ => client.scopes.clone(),
        };
        if let Some(unknown) = scopes.iter().find(|s| !client.scopes.contains(s)) {
            return Err(OAuthEngineError::InvalidScope(format!(
                "scope '{unknown}' is not registered for this client"
            )));
        }

        Ok(ValidatedAuthorization {
            client_id: client.client_id,
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            pkce,
        })
    }

    /// Issue an authorization code for `user_id` and build the client redirect
    pub async fn issue_code(
        &self,
        authorization: ValidatedAuthorization,
        user_id: &str,
        state: Option<&str>,
    ) -> OAuthResult<Url> {
        let mut redirect = Url::parse(&authorization.redirect_uri)
            .map_err(|_| OAuthEngineError::InvalidRequest("Invalid redirect_uri".to_string()))?;
        let code = generate_secure_token(TOKEN_BYTES);
        let now = Utc::now();
        let expires_at = expiry(now, self.config.code_ttl())?;

        let (code_challenge, code_challenge_method) = match authorization.pkce {
            Some(pkce) => (Some(pkce.challenge), Some(pkce.method)),
            None => (None, None),
        };

        self.store
            .insert_code(AuthorizationCodeRecord {
                code_digest: token_digest(&code),
                client_id: authorization.client_id.clone(),
                user_id: user_id.to_string(),
                redirect_uri: authorization.redirect_uri,
                scopes: authorization.scopes,
                code_challenge,
                code_challenge_method,
                expires_at,
                used: false,
                created_at: now,
            })
            .await?;

        {
            let mut query = redirect.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = state.filter(|s| !s.is_empty()) {
                query.append_pair("state", state);
            }
        }

        info!(client_id = %authorization.client_id, user_id = %user_id, "Authorization code issued");
        self.audit.record(
            AuditEvent::new(AuditEventType::CodeIssued, AuditSeverity::Info, "Authorization code issued")
                .with_actor(user_id)
                .with_resource(authorization.client_id.as_str()),
        );

        Ok(redirect)
    }

    /// Validate and issue in one step for an already-resolved end user
    pub async fn authorize(&self, request: &AuthorizeRequest, user_id: &str) -> OAuthResult<Url> {
        let authorization = self.validate_authorization(request).await?;
        self.issue_code(authorization, user_id, request.state.as_deref())
            .await
    }

    // ========================================================================
    // Token endpoint
    // ========================================================================

    /// `authorization_code` grant
    pub async fn exchange_code(&self, exchange: CodeExchange<'_>) -> OAuthResult<IssuedTokens> {
        let client = self
            .authenticate_client(exchange.client_id, exchange.client_secret)
            .await?;

        let now = Utc::now();
        let redemption = CodeRedemption {
            client_id: &client.client_id,
            redirect_uri: exchange.redirect_uri,
            now,
        };

        let code = match self
            .store
            .consume_code(&token_digest(exchange.code), redemption)
            .await
        {
            Ok(code) => code,
            Err(StoreError::CodeAlreadyUsed) => {
                self.report_reuse(&client.client_id, "authorization_code");
                return Err(invalid_code());
            }
            Err(e @ StoreError::General(_)) => return Err(e.into()),
            Err(e) => {
                debug!(client_id = %client.client_id, "Code exchange rejected: {}", e);
                return Err(invalid_code());
            }
        };

        if let Some(challenge) = &code.code_challenge {
            let verified = exchange
                .code_verifier
                .is_some_and(|verifier| verify_pkce(verifier, challenge));
            if !verified {
                warn!(client_id = %client.client_id, "PKCE verification failed");
                return Err(OAuthEngineError::InvalidGrant(
                    "PKCE verification failed".to_string(),
                ));
            }
        }

        let (issued, access, refresh) =
            self.mint_pair(&client.client_id, &code.user_id, code.scopes, now)?;
        self.store.insert_tokens(access, Some(refresh)).await?;

        info!(client_id = %client.client_id, user_id = %code.user_id, "Tokens issued for authorization code");
        self.audit_issue(AuditEventType::TokenIssued, &client.client_id, &code.user_id, "authorization_code");

        Ok(issued)
    }

    /// `refresh_token` grant; retires the presented pair
    pub async fn refresh(&self, exchange: RefreshExchange<'_>) -> OAuthResult<IssuedTokens> {
        let client = self
            .authenticate_client(exchange.client_id, exchange.client_secret)
            .await?;

        let refresh_digest = token_digest(exchange.refresh_token);
        let current = match self.store.get_token(&refresh_digest).await {
            Ok(token) => token,
            Err(StoreError::TokenNotFound) => return Err(invalid_refresh()),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let (issued, access, refresh) =
            self.mint_pair(&client.client_id, &current.user_id, current.scopes.clone(), now)?;

        let rotation = RefreshRotation {
            client_id: &client.client_id,
            now,
        };

        match self
            .store
            .rotate_refresh_token(&refresh_digest, rotation, access, refresh)
            .await
        {
            Ok(_) => {}
            Err(StoreError::TokenInactive) => {
                self.report_reuse(&client.client_id, "refresh_token");
                return Err(invalid_refresh());
            }
            Err(e @ StoreError::General(_)) => return Err(e.into()),
            Err(e) => {
                debug!(client_id = %client.client_id, "Refresh rejected: {}", e);
                return Err(invalid_refresh());
            }
        }

        info!(client_id = %client.client_id, user_id = %current.user_id, "Token pair rotated");
        self.audit_issue(AuditEventType::TokenRefreshed, &client.client_id, &current.user_id, "refresh_token");

        Ok(issued)
    }

    /// `client_credentials` grant; access token only, for `system_<client_id>`
    pub async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> OAuthResult<IssuedTokens> {
        let client = self.authenticate_client(client_id, client_secret).await?;
        let user_id = format!("system_{}", client.client_id);

        let issued = self
            .store_access_token(&client.client_id, &user_id, client.scopes.clone())
            .await?;

        info!(client_id = %client.client_id, "Client credentials token issued");
        self.audit_issue(AuditEventType::TokenIssued, &client.client_id, &user_id, "client_credentials");
        Ok(issued)
    }

    /// Mint a standalone access token for an active client
    pub async fn create_access_token(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
    ) -> OAuthResult<IssuedTokens> {
        self.get_client(client_id).await?;
        self.store_access_token(client_id, user_id, scopes).await
    }

    /// Resolve an access token to the identity it was issued for
    pub async fn validate_access_token(&self, token: &str) -> OAuthResult<TokenIdentity> {
        let record = match self.store.get_token(&token_digest(token)).await {
            Ok(record) => record,
            Err(StoreError::TokenNotFound) => return Err(OAuthEngineError::TokenNotFound),
            Err(e) => return Err(e.into()),
        };

        if record.kind != TokenKind::Access {
            // Refresh tokens are not bearer credentials
            return Err(OAuthEngineError::TokenNotFound);
        }
        if !record.is_active {
            return Err(OAuthEngineError::TokenRevoked);
        }
        if record.is_expired_at(Utc::now()) {
            return Err(OAuthEngineError::TokenExpired);
        }

        Ok(TokenIdentity {
            user_id: record.user_id,
            client_id: record.client_id,
            scopes: record.scopes,
            expires_at: record.expires_at,
        })
    }

    // ========================================================================
    // Revocation and maintenance
    // ========================================================================

    /// Revoke a token and its paired token; returns how many were revoked
    pub async fn revoke_token(&self, token: &str) -> OAuthResult<usize> {
        let revoked = match self.store.deactivate_token(&token_digest(token)).await {
            Ok(count) => count,
            Err(StoreError::TokenNotFound) => return Err(OAuthEngineError::TokenNotFound),
            Err(e) => return Err(e.into()),
        };

        if revoked > 0 {
            self.audit.record(
                AuditEvent::new(AuditEventType::TokenRevoked, AuditSeverity::Info, "Token revoked")
                    .with_metadata("count", json!(revoked)),
            );
        }
        Ok(revoked)
    }

    /// Revocation on behalf of an authenticated client (RFC 7009).
    ///
    /// Unknown tokens and tokens of other clients are silently ignored.
    pub async fn revoke_client_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token: &str,
    ) -> OAuthResult<usize> {
        let client = self.authenticate_client(client_id, client_secret).await?;

        match self.store.get_token(&token_digest(token)).await {
            Ok(record) if record.client_id == client.client_id => self.revoke_token(token).await,
            Ok(_) => {
                warn!(client_id = %client.client_id, "Client attempted to revoke a foreign token");
                Ok(0)
            }
            Err(StoreError::TokenNotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn revoke_all_user_tokens(&self, user_id: &str) -> OAuthResult<usize> {
        let revoked = self.store.deactivate_user_tokens(user_id).await?;
        info!(user_id = %user_id, revoked, "Revoked all tokens for user");
        self.audit.record(
            AuditEvent::new(AuditEventType::TokenRevoked, AuditSeverity::Info, "User tokens revoked")
                .with_resource(user_id)
                .with_metadata("count", json!(revoked)),
        );
        Ok(revoked)
    }

    pub async fn revoke_all_client_tokens(&self, client_id: &str) -> OAuthResult<usize> {
        let revoked = self.store.deactivate_client_tokens(client_id).await?;
        info!(client_id = %client_id, revoked, "Revoked all tokens for client");
        self.audit.record(
            AuditEvent::new(AuditEventType::TokenRevoked, AuditSeverity::Info, "Client tokens revoked")
                .with_resource(client_id)
                .with_metadata("count", json!(revoked)),
        );
        Ok(revoked)
    }

    /// Purge expired codes and tokens
    pub async fn cleanup_expired(&self) -> OAuthResult<PurgeStats> {
        let stats = self.store.purge_expired(Utc::now()).await.inspect_err(|e| {
            error!("Credential cleanup failed: {}", e);
        })?;
        if stats.codes > 0 || stats.tokens > 0 {
            info!(codes = stats.codes, tokens = stats.tokens, "Purged expired credentials");
        }
        Ok(stats)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn mint_pair(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> OAuthResult<(IssuedTokens, TokenRecord, TokenRecord)> {
        let access_token = generate_secure_token(TOKEN_BYTES);
        let refresh_token = generate_secure_token(TOKEN_BYTES);
        let access_digest = token_digest(&access_token);
        let refresh_digest = token_digest(&refresh_token);
        let access_expires_at = expiry(now, self.config.access_token_ttl())?;
        let refresh_expires_at = expiry(now, self.config.refresh_token_ttl())?;

        let access = TokenRecord {
            token_digest: access_digest.clone(),
            kind: TokenKind::Access,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            scopes: scopes.clone(),
            expires_at: access_expires_at,
            is_active: true,
            related_digest: Some(refresh_digest.clone()),
            created_at: now,
        };
        let refresh = TokenRecord {
            token_digest: refresh_digest,
            kind: TokenKind::Refresh,
            expires_at: refresh_expires_at,
            related_digest: Some(access_digest),
            ..access.clone()
        };

        let issued = IssuedTokens {
            access_token,
            access_expires_at,
            refresh_token: Some(refresh_token),
            scopes,
            issued_at: now,
        };
        Ok((issued, access, refresh))
    }

    async fn store_access_token(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
    ) -> OAuthResult<IssuedTokens> {
        let now = Utc::now();
        let access_token = generate_secure_token(TOKEN_BYTES);
        let access_expires_at = expiry(now, self.config.access_token_ttl())?;

        self.store
            .insert_tokens(
                TokenRecord {
                    token_digest: token_digest(&access_token),
                    kind: TokenKind::Access,
                    client_id: client_id.to_string(),
                    user_id: user_id.to_string(),
                    scopes: scopes.clone(),
                    expires_at: access_expires_at,
                    is_active: true,
                    related_digest: None,
                    created_at: now,
                },
                None,
            )
            .await?;

        Ok(IssuedTokens {
            access_token,
            access_expires_at,
            refresh_token: None,
            scopes,
            issued_at: now,
        })
    }

    fn report_reuse(&self, client_id: &str, grant_type: &str) {
        warn!(
            client_id = %client_id,
            grant_type = %grant_type,
            "Credential reuse detected; possible leakage"
        );
        self.audit.record(
            AuditEvent::new(
                AuditEventType::CredentialReuse,
                AuditSeverity::Warning,
                "Single-use credential presented again",
            )
            .with_actor(client_id)
            .with_metadata("grant_type", json!(grant_type)),
        );
    }

    fn audit_issue(&self, event_type: AuditEventType, client_id: &str, user_id: &str, grant_type: &str) {
        self.audit.record(
            AuditEvent::new(event_type, AuditSeverity::Info, "Tokens issued")
                .with_actor(user_id)
                .with_resource(client_id)
                .with_metadata("grant_type", json!(grant_type)),
        );
    }
}

impl std::fmt::Debug for OAuthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn expiry(now: DateTime<Utc>, ttl: chrono::Duration) -> OAuthResult<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| OAuthEngineError::Internal("credential lifetime out of range".to_string()))
}

fn invalid_code() -> OAuthEngineError {
    OAuthEngineError::InvalidGrant("Invalid or expired authorization code".to_string())
}

fn invalid_refresh() -> OAuthEngineError {
    OAuthEngineError::InvalidGrant("Invalid or expired refresh token".to_string())
}

/// Split-and-dedup preserving first occurrence order
fn dedup_scopes<'a>(scopes: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for scope in scopes {
        if !scope.is_empty() && !out.iter().any(|s| s == scope) {
            out.push(scope.to_string());
        }
    }
    out
}
