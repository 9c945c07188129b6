//! OAuth2 request, response and domain models

use crate::store::ClientRecord;
use axum::Json;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered client as exposed by the API. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    pub name: String,
    pub description: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ClientRecord> for Client {
    fn from(record: &ClientRecord) -> Self {
        Self {
            client_id: record.client_id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            redirect_uri: record.redirect_uri.clone(),
            scopes: record.scopes.clone(),
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Client returned once, at registration, together with its secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredClient {
    #[serde(flatten)]
    pub client: Client,
    pub client_secret: String,
}

/// Client registration request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Authorization request parameters (`GET /oauth2/authorize`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Token request parameters (`POST /oauth2/token`, `POST /oauth2/refresh`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Revocation request parameters (`POST /oauth2/revoke`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    pub token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Credentials minted by a grant
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
}

impl IssuedTokens {
    pub fn into_response(self) -> TokenResponse {
        TokenResponse {
            expires_in: (self.access_expires_at - self.issued_at).num_seconds(),
            access_token: self.access_token,
            token_type: "Bearer".to_string(),
            refresh_token: self.refresh_token,
            scope: self.scopes.join(" "),
        }
    }
}

/// Token response (RFC 6749 §5.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String, // Always "Bearer"
    pub expires_in: i64,    // Seconds until expiration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// Identity bound to a valid access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// OAuth2 error codes (RFC 6749 §4.1.2.1, §5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    InvalidScope,
    UnsupportedGrantType,
    UnsupportedResponseType,
    AccessDenied,
    ServerError,
}

impl OAuthErrorCode {
    /// Every client-side OAuth2 error, `invalid_client` included, is a 400
    pub fn status(&self) -> StatusCode {
        match self {
            OAuthErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: OAuthErrorCode,
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl OAuthError {
    pub fn new(error: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            state: None,
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidClient, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant, description)
    }

    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::UnsupportedGrantType, description)
    }

    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::AccessDenied, description)
    }

    /// Echo the authorization request's `state`
    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state.filter(|s| !s.is_empty());
        self
    }

    pub fn into_rejection(self) -> OAuthRejection {
        (self.error.status(), Json(self))
    }
}

/// Error response of the OAuth2 endpoints
pub type OAuthRejection = (StatusCode, Json<OAuthError>);
