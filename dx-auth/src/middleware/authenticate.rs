//! Bearer authentication
//!
//! Resolves `Authorization: Bearer <token>` to an [`AuthenticatedIdentity`].
//! Compact JWS tokens go to the federated [`JwtValidator`]; anything else is
//! treated as an access token issued by this server.

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditSeverity};
use crate::error::{AccessError, AccessResult};
use crate::jwt::{JwtValidator, looks_like_jwt};
use crate::models::{AuthContext, AuthenticatedIdentity};
use crate::oauth::OAuthEngine;
use crate::rbac::is_public_path;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why no bearer token could be read from a request
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BearerError {
    #[error("Authorization header missing")]
    MissingHeader,

    #[error("Authorization header is not a Bearer credential")]
    WrongScheme,

    #[error("Bearer token is empty")]
    EmptyToken,
}

/// Extract the bearer token from request headers
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(BearerError::MissingHeader)?
        .to_str()
        .map_err(|_| BearerError::WrongScheme)?;

    let (scheme, token) = value.split_once(' ').ok_or(BearerError::WrongScheme)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(BearerError::WrongScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(BearerError::EmptyToken);
    }
    Ok(token)
}

/// Resolves bearer tokens through the configured validators
pub struct Authenticator {
    oauth: Arc<OAuthEngine>,
    jwt: Option<Arc<JwtValidator>>,
    audit: AuditLogger,
}

impl Authenticator {
    pub fn new(oauth: Arc<OAuthEngine>, jwt: Option<Arc<JwtValidator>>, audit: AuditLogger) -> Self {
        Self { oauth, jwt, audit }
    }

    pub fn jwt(&self) -> Option<&JwtValidator> {
        self.jwt.as_deref()
    }

    /// Validate a raw bearer token
    pub async fn authenticate_token(
        &self,
        token: &str,
    ) -> AccessResult<(AuthenticatedIdentity, Option<AuthContext>)> {
        if looks_like_jwt(token) {
            let Some(jwt) = &self.jwt else {
                return Err(AccessError::authentication(
                    "JWT presented but no identity provider is configured",
                ));
            };
            let (identity, context) = jwt.validate_token(token).await?;
            return Ok((identity, Some(context)));
        }

        let resolved = self.oauth.validate_access_token(token).await?;
        let identity = AuthenticatedIdentity::from_oauth_token(
            resolved.user_id,
            resolved.client_id,
            resolved.scopes,
            resolved.expires_at,
        );
        Ok((identity, None))
    }

    /// Authenticate from request headers
    pub async fn authenticate_headers(
        &self,
        headers: &HeaderMap,
    ) -> AccessResult<(AuthenticatedIdentity, Option<AuthContext>)> {
        let token = extract_bearer(headers).map_err(|e| AccessError::authentication(e.to_string()))?;
        self.authenticate_token(token).await
    }

    pub(crate) fn record_failure(&self, method: &str, path: &str, error: &AccessError) {
        self.audit.record(
            AuditEvent::new(
                AuditEventType::AuthFailure,
                AuditSeverity::Warning,
                "Request authentication failed",
            )
            .with_resource(path)
            .with_metadata("method", json!(method))
            .with_metadata("reason", json!(error.to_string())),
        );
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("jwt_enabled", &self.jwt.is_some())
            .finish_non_exhaustive()
    }
}

/// Authentication middleware.
///
/// Public paths and requests that already carry an identity pass through.
/// Everything else needs a valid bearer token or is answered with 401.
#[derive(Debug, Clone)]
pub struct AuthenticationMiddleware {
    authenticator: Arc<Authenticator>,
}

impl AuthenticationMiddleware {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    pub async fn process(&self, mut request: Request, next: Next) -> Result<Response, AccessError> {
        let path = request.uri().path().to_string();
        let method = request.method().to_string();

        if is_public_path(&path) {
            return Ok(next.run(request).await);
        }
        if request.extensions().get::<AuthenticatedIdentity>().is_some() {
            debug!(%method, %path, "Identity already resolved upstream");
            return Ok(next.run(request).await);
        }

        match self.authenticator.authenticate_headers(request.headers()).await {
            Ok((identity, context)) => {
                debug!(
                    subject = %identity.subject,
                    source = ?identity.source,
                    %method,
                    %path,
                    "Request authenticated"
                );
                request.extensions_mut().insert(identity);
                if let Some(context) = context {
                    request.extensions_mut().insert(context);
                }
                Ok(next.run(request).await)
            }
            Err(e) => {
                warn!(%method, %path, "Authentication failed: {}", e);
                self.authenticator.record_failure(&method, &path, &e);
                Err(e)
            }
        }
    }
}
