//! Roles, permissions and the role→permission table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unrecognised role or permission name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),
}

/// Roles issued by the federated identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full access to all resources
    #[serde(rename = "OpenDIF_Admin")]
    Admin,
    /// Internal services; read access across every resource
    #[serde(rename = "OpenDIF_System")]
    System,
    /// Access to own resources and public endpoints
    #[serde(rename = "OpenDIF_Member")]
    Member,
}

impl Role {
    /// Roles in precedence order, highest first
    pub const PRECEDENCE: [Role; 3] = [Role::Admin, Role::System, Role::Member];

    /// Wire name of the role as it appears in identity-provider claims
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "OpenDIF_Admin",
            Role::System => "OpenDIF_System",
            Role::Member => "OpenDIF_Member",
        }
    }

    /// Permissions granted to this role
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => Permission::ALL,
            Role::Member => MEMBER_PERMISSIONS,
            Role::System => SYSTEM_PERMISSIONS,
        }
    }

    /// Check if this role grants a permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::PRECEDENCE
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseError::UnknownRole(s.to_string()))
    }
}

macro_rules! permissions {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// Fine-grained permission in `resource:action` form
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $($(#[$doc])* $variant,)+
        }

        impl Permission {
            /// Every permission, in table order
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            /// Wire name of the permission
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Permission::$variant => $name,)+
                }
            }
        }

        impl FromStr for Permission {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Permission::$variant),)+
                    other => Err(ParseError::UnknownPermission(other.to_string())),
                }
            }
        }
    };
}

permissions! {
    SchemaCreate => "schema:create",
    SchemaRead => "schema:read",
    SchemaUpdate => "schema:update",
    SchemaDelete => "schema:delete",
    SchemaReadAll => "schema:read:all",

    SchemaSubmissionCreate => "schema_submission:create",
    SchemaSubmissionRead => "schema_submission:read",
    SchemaSubmissionUpdate => "schema_submission:update",
    SchemaSubmissionDelete => "schema_submission:delete",
    SchemaSubmissionReadAll => "schema_submission:read:all",
    SchemaSubmissionApprove => "schema_submission:approve",

    ApplicationCreate => "application:create",
    ApplicationRead => "application:read",
    ApplicationUpdate => "application:update",
    ApplicationDelete => "application:delete",
    ApplicationReadAll => "application:read:all",

    ApplicationSubmissionCreate => "application_submission:create",
    ApplicationSubmissionRead => "application_submission:read",
    ApplicationSubmissionUpdate => "application_submission:update",
    ApplicationSubmissionDelete => "application_submission:delete",
    ApplicationSubmissionReadAll => "application_submission:read:all",
    ApplicationSubmissionApprove => "application_submission:approve",

    MemberCreate => "member:create",
    MemberRead => "member:read",
    MemberUpdate => "member:update",
    MemberDelete => "member:delete",
    MemberReadAll => "member:read:all",
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::SchemaCreate,
    Permission::SchemaRead,
    Permission::SchemaUpdate,
    Permission::SchemaSubmissionCreate,
    Permission::SchemaSubmissionRead,
    Permission::SchemaSubmissionUpdate,
    Permission::ApplicationCreate,
    Permission::ApplicationRead,
    Permission::ApplicationUpdate,
    Permission::ApplicationSubmissionCreate,
    Permission::ApplicationSubmissionRead,
    Permission::ApplicationSubmissionUpdate,
    Permission::MemberRead,
    Permission::MemberUpdate,
];

const SYSTEM_PERMISSIONS: &[Permission] = &[
    Permission::SchemaRead,
    Permission::SchemaReadAll,
    Permission::SchemaSubmissionRead,
    Permission::SchemaSubmissionReadAll,
    Permission::ApplicationRead,
    Permission::ApplicationReadAll,
    Permission::ApplicationSubmissionRead,
    Permission::ApplicationSubmissionReadAll,
    Permission::MemberRead,
    Permission::MemberReadAll,
];

/// Union of the permissions granted by `roles`, deduplicated and sorted
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut permissions: Vec<Permission> = roles
        .iter()
        .flat_map(|role| role.permissions().iter().copied())
        .collect();
    permissions.sort();
    permissions.dedup();
    permissions
}
