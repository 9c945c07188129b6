//! Resolved request identities
//!
//! Both credential kinds accepted by the gateway, self-issued OAuth2 access
//! tokens and externally issued JWTs, are reduced to one
//! [`AuthenticatedIdentity`] so that authorization never has to care where a
//! caller came from.

use crate::rbac::{Permission, Role, permissions_for_roles};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which validator produced an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Opaque access token issued by this server
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Federated JWT verified against the identity provider's JWKS
    Jwt,
}

/// Request-scoped identity; never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    /// Subject (end-user id, or `system_<client_id>` for client credentials)
    pub subject: String,
    /// Email address, present for federated identities
    pub email: Option<String>,
    /// Organisation claim, present for federated identities
    pub org_name: Option<String>,
    /// Recognised roles
    pub roles: Vec<Role>,
    /// Identity-provider groups, carried through untouched
    #[serde(default)]
    pub groups: Vec<String>,
    /// Effective permissions
    pub permissions: Vec<Permission>,
    /// OAuth2 scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Client the token was issued to, for OAuth2 identities
    pub client_id: Option<String>,
    /// Credential expiry
    pub expires_at: DateTime<Utc>,
    /// Validator that produced this identity
    pub source: IdentitySource,
}

impl AuthenticatedIdentity {
    /// Identity for a self-issued access token.
    ///
    /// OAuth2 tokens carry no roles; scopes that name a known permission are
    /// granted as that permission.
    pub fn from_oauth_token(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        scopes: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let mut permissions: Vec<Permission> =
            scopes.iter().filter_map(|s| s.parse().ok()).collect();
        permissions.sort();
        permissions.dedup();

        Self {
            subject: user_id.into(),
            email: None,
            org_name: None,
            roles: Vec::new(),
            groups: Vec::new(),
            permissions,
            scopes,
            client_id: Some(client_id.into()),
            expires_at,
            source: IdentitySource::OAuth2,
        }
    }

    /// Identity for a federated user; permissions are derived from roles
    pub fn from_roles(
        subject: impl Into<String>,
        roles: Vec<Role>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            subject: subject.into(),
            email: None,
            org_name: None,
            roles,
            groups: Vec::new(),
            permissions,
            scopes: Vec::new(),
            client_id: None,
            expires_at,
            source: IdentitySource::Jwt,
        }
    }

    /// Attach an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach an organisation name
    pub fn with_org(mut self, org_name: impl Into<String>) -> Self {
        self.org_name = Some(org_name.into());
        self
    }

    /// Attach identity-provider groups
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        has_scope(&self.scopes, scope)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_system(&self) -> bool {
        self.has_role(Role::System)
    }

    /// Highest-precedence role held (Admin > System > Member)
    pub fn primary_role(&self) -> Option<Role> {
        Role::PRECEDENCE
            .into_iter()
            .find(|role| self.has_role(*role))
    }

    /// Whether the credential has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Check whether `required` is among the granted scopes
pub fn has_scope(scopes: &[String], required: &str) -> bool {
    scopes.iter().any(|scope| scope == required)
}

/// Validated federated token, kept for handlers that need the raw credential
#[derive(Clone)]
pub struct AuthContext {
    pub identity: AuthenticatedIdentity,
    pub token: String,
    pub issued_by: String,
    pub audience: Vec<String>,
    pub permissions: Vec<Permission>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("identity", &self.identity)
            .field("token", &"[REDACTED]")
            .field("issued_by", &self.issued_by)
            .field("audience", &self.audience)
            .field("permissions", &self.permissions)
            .finish()
    }
}
