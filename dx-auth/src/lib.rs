//! # OpenDIF Data-Exchange Access Control
//!
//! Access control for the data-exchange API gateway: an OAuth2 authorization
//! server for registered consumer applications, a JWT validator for tokens
//! issued by the national identity provider, and a table-driven RBAC engine
//! that decides whether an authenticated caller may invoke a route.
//!
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::new_without_default)]
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use opendif_dx_auth::{AccessConfig, AppState, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = AppState::new(AccessConfig::from_env()?)?;
//!
//!     let resources = Router::new().route("/api/v1/schemas", get(list_schemas));
//!     let app = build_router(state, resources);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request pipeline
//!
//! 1. Paths under `/health`, `/debug`, `/openapi.yaml` and `/favicon.ico`
//!    bypass access control.
//! 2. The bearer token is validated: compact JWS tokens against the identity
//!    provider's JWKS, everything else as an access token issued here.
//! 3. The resolved [`AuthenticatedIdentity`] is checked against the endpoint
//!    permission table. Routes missing from the table fall back to the
//!    configured [`AuthorizationMode`].
//!
//! Handlers find the identity and the [`Decision`] in request extensions. When
//! the decision says ownership is required, the handler finishes the check
//! with [`can_access_resource`].
//!
//! ## OAuth2 endpoints
//!
//! - `GET /oauth2/authorize` - authorization code issuance (PKCE optional)
//! - `POST /oauth2/token` - `authorization_code`, `refresh_token`,
//!   `client_credentials`
//! - `POST /oauth2/refresh` - refresh with rotation
//! - `POST /oauth2/revoke` - RFC 7009 revocation
//! - `POST /oauth2/clients`, `GET|DELETE /oauth2/clients/:client_id` -
//!   client management, administrators only

pub mod app;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod rbac;
pub mod store;

// Re-export main types
pub use app::{AppState, build_router};
pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditSink, MemoryAuditSink};
pub use config::{AccessConfig, ConfigError, JwtConfig, OAuthConfig, RbacConfig};
pub use error::{AccessError, AccessResult, ErrorBody};
pub use jwks::{JwksError, KeyCache};
pub use jwt::{JwtError, JwtValidator, UserClaims};
pub use middleware::{
    AuthenticationMiddleware, Authenticator, AuthorizationMiddleware, require_any_role,
    require_permission, require_role,
};
pub use models::{AuthContext, AuthenticatedIdentity, IdentitySource, has_scope};
pub use oauth::{Client, OAuthEngine, OAuthEngineError, OAuthError};
pub use rbac::{
    AuthorizationMode, Authorizer, AuthzError, Decision, EndpointIndex, EndpointPermission,
    Permission, Role, can_access_resource,
};
pub use store::{CredentialStore, InMemoryCredentialStore, StoreError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_format() {
        assert!(VERSION.split('.').count() >= 3);
    }

    #[test]
    fn test_default_state_builds() {
        let state = AppState::new(AccessConfig::default()).unwrap();
        assert!(state.authenticator.jwt().is_none());
        assert_eq!(state.authorizer.mode(), AuthorizationMode::FailOpenAdminSystem);
    }
}
