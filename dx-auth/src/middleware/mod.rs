//! Axum middleware for request authentication and authorization
//!
//! Layer order on a protected router is authentication (outer) then
//! authorization:
//!
//! ```rust,ignore
//! let authn = AuthenticationMiddleware::new(authenticator);
//! let authz = AuthorizationMiddleware::new(authorizer, audit);
//!
//! let protected = Router::new()
//!     .route("/api/v1/schemas", get(list_schemas))
//!     .layer(from_fn(move |req, next| {
//!         let authz = authz.clone();
//!         async move { authz.process(req, next).await }
//!     }))
//!     .layer(from_fn(move |req, next| {
//!         let authn = authn.clone();
//!         async move { authn.process(req, next).await }
//!     }));
//! ```

pub mod authenticate;
pub mod authorize;
pub mod gates;

pub use authenticate::{AuthenticationMiddleware, Authenticator, BearerError, extract_bearer};
pub use authorize::AuthorizationMiddleware;
pub use gates::{
    check_any_role, check_permission, check_role, require_any_role, require_permission,
    require_role,
};
