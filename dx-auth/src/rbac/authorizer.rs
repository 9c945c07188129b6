//! Route authorization
//!
//! Looks up the permission a route requires and checks it against the
//! resolved identity. Routes missing from the table fall back to the
//! configured [`AuthorizationMode`].

use super::{EndpointIndex, Permission, Role};
use crate::models::AuthenticatedIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Path prefixes that bypass authentication and authorization
pub const PUBLIC_PATH_PREFIXES: &[&str] = &["/health", "/debug", "/openapi.yaml", "/favicon.ico"];

/// Whether `path` is served without any credential
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Policy applied to routes missing from the endpoint table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// Deny every undefined route
    FailClosed,
    /// Admit administrators only
    FailOpenAdmin,
    /// Admit administrators and internal services
    #[default]
    FailOpenAdminSystem,
}

impl AuthorizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMode::FailClosed => "fail_closed",
            AuthorizationMode::FailOpenAdmin => "fail_open_admin",
            AuthorizationMode::FailOpenAdminSystem => "fail_open_admin_system",
        }
    }

    /// Parse a mode name; anything unrecognised is treated as fail-closed
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail_closed" => AuthorizationMode::FailClosed,
            "fail_open_admin" => AuthorizationMode::FailOpenAdmin,
            "fail_open_admin_system" => AuthorizationMode::FailOpenAdminSystem,
            other => {
                warn!(mode = %other, "Unknown authorization mode, using fail_closed");
                AuthorizationMode::FailClosed
            }
        }
    }

    /// Whether an undefined route admits `identity` under this mode
    pub fn admits(&self, identity: &AuthenticatedIdentity) -> bool {
        match self {
            AuthorizationMode::FailClosed => false,
            AuthorizationMode::FailOpenAdmin => identity.is_admin(),
            AuthorizationMode::FailOpenAdminSystem => identity.is_admin() || identity.is_system(),
        }
    }
}

impl fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful authorization, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Public path; no identity was required
    Public,
    /// A table rule matched and its permission is held
    Granted {
        permission: Permission,
        /// Handler must still call [`can_access_resource`]
        ownership_required: bool,
    },
    /// No rule matched and the default policy admitted the caller
    DefaultPolicy(AuthorizationMode),
}

impl Decision {
    pub fn ownership_required(&self) -> bool {
        matches!(
            self,
            Decision::Granted {
                ownership_required: true,
                ..
            }
        )
    }
}

/// Authorization failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Missing permission {0}")]
    MissingPermission(Permission),

    #[error("Route not covered by authorization table; denied by {0} policy")]
    UndefinedRoute(AuthorizationMode),

    #[error("Role {0} required")]
    MissingRole(Role),
}

/// Table-driven route authorizer
#[derive(Debug, Clone)]
pub struct Authorizer {
    index: EndpointIndex,
    mode: AuthorizationMode,
    strict_mode: bool,
}

impl Authorizer {
    pub fn new(index: EndpointIndex, mode: AuthorizationMode, strict_mode: bool) -> Self {
        Self {
            index,
            mode,
            strict_mode,
        }
    }

    pub fn mode(&self) -> AuthorizationMode {
        self.mode
    }

    pub fn index(&self) -> &EndpointIndex {
        &self.index
    }

    /// Authorize `identity` for `method` on `path`
    pub fn authorize(
        &self,
        identity: Option<&AuthenticatedIdentity>,
        method: &str,
        path: &str,
    ) -> Result<Decision, AuthzError> {
        if is_public_path(path) {
            return Ok(Decision::Public);
        }

        let Some(identity) = identity else {
            warn!(%method, %path, "Authorization attempted without identity");
            return Err(AuthzError::Unauthenticated);
        };

        if let Some(rule) = self.index.lookup(method, path) {
            if identity.has_permission(rule.permission) {
                debug!(
                    subject = %identity.subject,
                    %method,
                    %path,
                    permission = %rule.permission,
                    "Access granted"
                );
                return Ok(Decision::Granted {
                    permission: rule.permission,
                    ownership_required: rule.ownership_required,
                });
            }

            warn!(
                subject = %identity.subject,
                %method,
                %path,
                permission = %rule.permission,
                "Access denied: missing permission"
            );
            return Err(AuthzError::MissingPermission(rule.permission));
        }

        let admitted = self.mode.admits(identity);

        if self.strict_mode {
            warn!(
                subject = %identity.subject,
                %method,
                %path,
                mode = %self.mode,
                admitted,
                "Request to route missing from authorization table"
            );
        }

        if admitted {
            debug!(subject = %identity.subject, %method, %path, mode = %self.mode, "Undefined route admitted by default policy");
            Ok(Decision::DefaultPolicy(self.mode))
        } else {
            warn!(subject = %identity.subject, %method, %path, mode = %self.mode, "Undefined route denied by default policy");
            Err(AuthzError::UndefinedRoute(self.mode))
        }
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new(
            EndpointIndex::with_defaults(),
            AuthorizationMode::default(),
            false,
        )
    }
}

/// Ownership-aware access check for resource handlers.
///
/// Administrators and internal services only need the permission. Anyone
/// else must also own the resource when an owner is given.
pub fn can_access_resource(
    identity: &AuthenticatedIdentity,
    permission: Permission,
    resource_owner_id: Option<&str>,
) -> bool {
    if !identity.has_permission(permission) {
        return false;
    }

    if identity.is_admin() || identity.is_system() {
        return true;
    }

    match resource_owner_id {
        Some(owner) => owner == identity.subject,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn identity(roles: Vec<Role>) -> AuthenticatedIdentity {
        AuthenticatedIdentity::from_roles("user-1", roles, Utc::now() + Duration::hours(1))
    }

    fn authorizer(mode: AuthorizationMode) -> Authorizer {
        Authorizer::new(EndpointIndex::with_defaults(), mode, false)
    }

    #[test]
    fn test_public_paths_bypass() {
        let authz = authorizer(AuthorizationMode::FailClosed);

        for path in ["/health", "/health/live", "/debug/pprof", "/openapi.yaml", "/favicon.ico"] {
            assert_eq!(authz.authorize(None, "GET", path), Ok(Decision::Public));
        }
    }

    #[test]
    fn test_missing_identity() {
        let authz = Authorizer::default();
        assert_eq!(
            authz.authorize(None, "GET", "/api/v1/schemas"),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn test_table_rule_granted_and_denied() {
        let authz = Authorizer::default();
        let member = identity(vec![Role::Member]);

        let decision = authz
            .authorize(Some(&member), "PUT", "/api/v1/schemas/s-1")
            .unwrap();
        assert_eq!(
            decision,
            Decision::Granted {
                permission: Permission::SchemaUpdate,
                ownership_required: true
            }
        );
        assert!(decision.ownership_required());

        assert_eq!(
            authz.authorize(Some(&member), "DELETE", "/api/v1/schemas/s-1"),
            Err(AuthzError::MissingPermission(Permission::SchemaDelete))
        );
    }

    #[test]
    fn test_undefined_route_modes() {
        let admin = identity(vec![Role::Admin]);
        let system = identity(vec![Role::System]);
        let member = identity(vec![Role::Member]);
        let path = "/api/v1/reports";

        let authz = authorizer(AuthorizationMode::FailOpenAdminSystem);
        assert!(authz.authorize(Some(&admin), "GET", path).is_ok());
        assert!(authz.authorize(Some(&system), "GET", path).is_ok());
        assert!(authz.authorize(Some(&member), "GET", path).is_err());

        let authz = authorizer(AuthorizationMode::FailOpenAdmin);
        assert!(authz.authorize(Some(&admin), "GET", path).is_ok());
        assert!(authz.authorize(Some(&system), "GET", path).is_err());

        let authz = authorizer(AuthorizationMode::FailClosed);
        assert_eq!(
            authz.authorize(Some(&admin), "GET", path),
            Err(AuthzError::UndefinedRoute(AuthorizationMode::FailClosed))
        );
    }

    #[test]
    fn test_strict_mode_does_not_change_outcome() {
        let admin = identity(vec![Role::Admin]);
        let strict = Authorizer::new(
            EndpointIndex::with_defaults(),
            AuthorizationMode::FailOpenAdminSystem,
            true,
        );

        assert_eq!(
            strict.authorize(Some(&admin), "GET", "/api/v1/reports"),
            Ok(Decision::DefaultPolicy(AuthorizationMode::FailOpenAdminSystem))
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            AuthorizationMode::parse_lenient("fail_open_admin"),
            AuthorizationMode::FailOpenAdmin
        );
        assert_eq!(
            AuthorizationMode::parse_lenient(" FAIL_OPEN_ADMIN_SYSTEM "),
            AuthorizationMode::FailOpenAdminSystem
        );
        assert_eq!(
            AuthorizationMode::parse_lenient("allow_everything"),
            AuthorizationMode::FailClosed
        );
        assert_eq!(AuthorizationMode::default(), AuthorizationMode::FailOpenAdminSystem);
    }

    #[test]
    fn test_can_access_resource() {
        let member = identity(vec![Role::Member]);
        let admin = identity(vec![Role::Admin]);
        let system = identity(vec![Role::System]);

        assert!(can_access_resource(&member, Permission::SchemaUpdate, Some("user-1")));
        assert!(!can_access_resource(&member, Permission::SchemaUpdate, Some("someone-else")));
        assert!(can_access_resource(&member, Permission::SchemaUpdate, None));
        assert!(!can_access_resource(&member, Permission::SchemaDelete, Some("user-1")));

        assert!(can_access_resource(&admin, Permission::SchemaDelete, Some("someone-else")));
        assert!(can_access_resource(&system, Permission::SchemaRead, Some("someone-else")));
        assert!(!can_access_resource(&system, Permission::SchemaUpdate, Some("someone-else")));
    }
}
