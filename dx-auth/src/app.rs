//! Application state and router assembly

use crate::audit::AuditLogger;
use crate::config::AccessConfig;
use crate::error::{AccessError, AccessResult};
use crate::jwt::JwtValidator;
use crate::middleware::{
    AuthenticationMiddleware, Authenticator, AuthorizationMiddleware, require_role,
};
use crate::oauth::{self, OAuthEngine};
use crate::rbac::{Authorizer, EndpointIndex, Role};
use crate::store::{CredentialStore, InMemoryCredentialStore};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for every access control route
#[derive(Debug, Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthEngine>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<Authorizer>,
    pub audit: AuditLogger,
    pub config: Arc<AccessConfig>,
}

impl AppState {
    /// State over an in-memory credential store with tracing audit output
    pub fn new(config: AccessConfig) -> AccessResult<Self> {
        Self::with_store(
            config,
            Arc::new(InMemoryCredentialStore::new()),
            AuditLogger::tracing(),
        )
    }

    pub fn with_store(
        config: AccessConfig,
        store: Arc<dyn CredentialStore>,
        audit: AuditLogger,
    ) -> AccessResult<Self> {
        let oauth = Arc::new(OAuthEngine::new(store, config.oauth.clone(), audit.clone()));

        let jwt = match &config.jwt {
            Some(jwt_config) => {
                info!(jwks_url = %jwt_config.jwks_url, "Federated JWT validation enabled");
                let validator = JwtValidator::new(jwt_config.clone())
                    .map_err(|e| AccessError::Internal(e.to_string()))?;
                Some(Arc::new(validator))
            }
            None => None,
        };

        let authorizer = Arc::new(Authorizer::new(
            EndpointIndex::with_defaults(),
            config.rbac.mode,
            config.rbac.strict_mode,
        ));
        info!(
            mode = %config.rbac.mode,
            strict = config.rbac.strict_mode,
            rules = authorizer.index().len(),
            "Route authorizer ready"
        );

        Ok(Self {
            authenticator: Arc::new(Authenticator::new(Arc::clone(&oauth), jwt, audit.clone())),
            oauth,
            authorizer,
            audit,
            config: Arc::new(config),
        })
    }

    /// Replace the federated JWT validator
    pub fn with_jwt_validator(mut self, validator: Arc<JwtValidator>) -> Self {
        self.authenticator = Arc::new(Authenticator::new(
            Arc::clone(&self.oauth),
            Some(validator),
            self.audit.clone(),
        ));
        self
    }

    /// Replace the route authorizer
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    pub fn authentication_middleware(&self) -> AuthenticationMiddleware {
        AuthenticationMiddleware::new(Arc::clone(&self.authenticator))
    }

    pub fn authorization_middleware(&self) -> AuthorizationMiddleware {
        AuthorizationMiddleware::new(Arc::clone(&self.authorizer), self.audit.clone())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assemble the gateway router.
///
/// `resources` are the protected API routes; they get authentication and
/// table-driven authorization. OAuth2 endpoints stay open, client management
/// requires an administrator.
pub fn build_router(state: AppState, resources: Router) -> Router {
    let authn = state.authentication_middleware();
    let authz = state.authorization_middleware();
    let management_authn = authn.clone();

    let protected = resources
        .layer(from_fn(move |req, next| {
            let authz = authz.clone();
            async move { authz.process(req, next).await }
        }))
        .layer(from_fn(move |req, next| {
            let authn = authn.clone();
            async move { authn.process(req, next).await }
        }));

    let clients = oauth::client_router()
        .layer(from_fn(|req, next| require_role(Role::Admin, req, next)))
        .layer(from_fn(move |req, next| {
            let authn = management_authn.clone();
            async move { authn.process(req, next).await }
        }));

    Router::new()
        .route("/health", get(health))
        .merge(oauth::oauth_router())
        .merge(clients)
        .with_state(state)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
}
