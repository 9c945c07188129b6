//! OAuth2 authorization server
//!
//! Authorization-code flow with optional PKCE (S256), refresh-token rotation,
//! client credentials and token revocation (RFC 7009).

pub mod authorize;
pub mod clients;
pub mod engine;
pub mod models;
pub mod pkce;
pub mod token;

pub use engine::{
    CodeExchange, OAuthEngine, OAuthEngineError, OAuthResult, RefreshExchange,
    ValidatedAuthorization,
};
pub use models::{
    AuthorizeRequest, Client, CreateClientRequest, IssuedTokens, OAuthError, OAuthErrorCode,
    OAuthRejection, RegisteredClient, RevokeRequest, TokenIdentity, TokenRequest, TokenResponse,
};

use crate::app::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Authorization, token, refresh and revocation endpoints
pub fn oauth_router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/authorize", get(authorize::authorize))
        .route("/oauth2/token", post(token::token))
        .route("/oauth2/refresh", post(token::refresh))
        .route("/oauth2/revoke", post(token::revoke))
}

/// Client management endpoints; callers must add authentication
pub fn client_router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/clients", post(clients::create_client))
        .route(
            "/oauth2/clients/:client_id",
            get(clients::get_client).delete(clients::disable_client),
        )
}
