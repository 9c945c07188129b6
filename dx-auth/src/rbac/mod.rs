//! Role-based access control
//!
//! A static endpoint table maps `(method, path)` to the permission it needs.
//! Roles map to permission sets, and routes missing from the table are
//! governed by a configurable default policy.

pub mod authorizer;
pub mod endpoints;
pub mod roles;

pub use authorizer::{
    AuthorizationMode, Authorizer, AuthzError, Decision, PUBLIC_PATH_PREFIXES,
    can_access_resource, is_public_path,
};
pub use endpoints::{EndpointIndex, EndpointPermission, default_endpoint_permissions};
pub use roles::{ParseError, Permission, Role, permissions_for_roles};
