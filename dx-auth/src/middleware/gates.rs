//! Handler-level role and permission gates
//!
//! ```rust,ignore
//! use axum::middleware::from_fn;
//! use opendif_dx_auth::middleware::require_role;
//! use opendif_dx_auth::rbac::Role;
//!
//! let admin = Router::new()
//!     .route("/admin/reindex", post(reindex))
//!     .layer(from_fn(move |req, next| require_role(Role::Admin, req, next)));
//! ```

use crate::error::AccessError;
use crate::models::AuthenticatedIdentity;
use crate::rbac::{AuthzError, Permission, Role};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Require a specific role
pub fn check_role(identity: Option<&AuthenticatedIdentity>, role: Role) -> Result<(), AuthzError> {
    let identity = identity.ok_or(AuthzError::Unauthenticated)?;
    if identity.has_role(role) {
        Ok(())
    } else {
        Err(AuthzError::MissingRole(role))
    }
}

/// Require at least one of `roles`
pub fn check_any_role(
    identity: Option<&AuthenticatedIdentity>,
    roles: &[Role],
) -> Result<(), AuthzError> {
    let identity = identity.ok_or(AuthzError::Unauthenticated)?;
    match roles.first() {
        Some(first) if !identity.has_any_role(roles) => Err(AuthzError::MissingRole(*first)),
        _ => Ok(()),
    }
}

pub fn check_permission(
    identity: Option<&AuthenticatedIdentity>,
    permission: Permission,
) -> Result<(), AuthzError> {
    let identity = identity.ok_or(AuthzError::Unauthenticated)?;
    if identity.has_permission(permission) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission(permission))
    }
}

fn gate(request: &Request, result: Result<(), AuthzError>) -> Result<(), AccessError> {
    result.map_err(|e| {
        let subject = request
            .extensions()
            .get::<AuthenticatedIdentity>()
            .map(|identity| identity.subject.as_str())
            .unwrap_or("-");
        warn!(
            %subject,
            method = %request.method(),
            path = %request.uri().path(),
            "Gate rejected request: {}",
            e
        );
        e.into()
    })
}

pub async fn require_role(role: Role, request: Request, next: Next) -> Result<Response, AccessError> {
    let identity = request.extensions().get::<AuthenticatedIdentity>();
    gate(&request, check_role(identity, role))?;
    Ok(next.run(request).await)
}

pub async fn require_any_role(
    roles: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, AccessError> {
    let identity = request.extensions().get::<AuthenticatedIdentity>();
    gate(&request, check_any_role(identity, roles))?;
    Ok(next.run(request).await)
}

pub async fn require_permission(
    permission: Permission,
    request: Request,
    next: Next,
) -> Result<Response, AccessError> {
    let identity = request.extensions().get::<AuthenticatedIdentity>();
    gate(&request, check_permission(identity, permission))?;
    Ok(next.run(request).await)
}
