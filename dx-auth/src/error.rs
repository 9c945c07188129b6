//! Error taxonomy for the access control layer

use crate::config::ConfigError;
use crate::jwt::JwtError;
use crate::oauth::engine::OAuthEngineError;
use crate::rbac::AuthzError;
use crate::store::StoreError;
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for access control operations
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors surfaced by the access control layer.
///
/// The message carried by [`AccessError::Authentication`] and
/// [`AccessError::TransientDependency`] is for logs only; the response body
/// is always generic.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed or incomplete input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated but not allowed
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An upstream dependency (JWKS endpoint) could not be reached
    #[error("Dependency unavailable: {0}")]
    TransientDependency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization<S: Into<String>>(msg: S) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Validation(_) => StatusCode::BAD_REQUEST,
            AccessError::Authentication(_) | AccessError::TransientDependency(_) => {
                StatusCode::UNAUTHORIZED
            }
            AccessError::Authorization(_) => StatusCode::FORBIDDEN,
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            AccessError::Validation(msg) => ErrorBody::InvalidRequest {
                message: msg.clone(),
            },
            AccessError::Authentication(_) | AccessError::TransientDependency(_) => {
                ErrorBody::Unauthorized {
                    message: "Authentication required".to_string(),
                }
            }
            AccessError::Authorization(_) => ErrorBody::Forbidden {
                message: "Insufficient permissions".to_string(),
            },
            AccessError::NotFound(msg) => ErrorBody::NotFound {
                message: msg.clone(),
            },
            AccessError::Internal(_) => ErrorBody::InternalError {
                message: "Internal server error".to_string(),
            },
        }
    }
}

/// API error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ErrorBody {
    InvalidRequest { message: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    InternalError { message: String },
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<OAuthEngineError> for AccessError {
    fn from(err: OAuthEngineError) -> Self {
        match err {
            OAuthEngineError::InvalidRequest(msg)
            | OAuthEngineError::InvalidScope(msg)
            | OAuthEngineError::UnsupportedResponseType(msg) => AccessError::Validation(msg),
            OAuthEngineError::ClientNotFound(id) => {
                AccessError::NotFound(format!("Client {id} not found"))
            }
            OAuthEngineError::Store(e) => AccessError::from(e),
            OAuthEngineError::Internal(msg) => AccessError::Internal(msg),
            other => AccessError::Authentication(other.to_string()),
        }
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        AccessError::Internal(err.to_string())
    }
}

impl From<JwtError> for AccessError {
    fn from(err: JwtError) -> Self {
        if err.is_transient() {
            AccessError::TransientDependency(err.to_string())
        } else {
            AccessError::Authentication(err.to_string())
        }
    }
}

impl From<AuthzError> for AccessError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => AccessError::Authentication(err.to_string()),
            other => AccessError::Authorization(other.to_string()),
        }
    }
}

impl From<ConfigError> for AccessError {
    fn from(err: ConfigError) -> Self {
        AccessError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Permission;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AccessError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AccessError::authentication("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::authorization("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(AccessError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AccessError::TransientDependency("jwks down".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_authentication_body_is_generic() {
        let body = AccessError::from(JwtError::Expired).body();
        assert_eq!(
            body,
            ErrorBody::Unauthorized {
                message: "Authentication required".to_string()
            }
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
        assert!(!json.to_string().contains("expired"));
    }

    #[test]
    fn test_authz_conversion() {
        assert!(matches!(
            AccessError::from(AuthzError::Unauthenticated),
            AccessError::Authentication(_)
        ));
        assert!(matches!(
            AccessError::from(AuthzError::MissingPermission(Permission::SchemaCreate)),
            AccessError::Authorization(_)
        ));
    }

    #[test]
    fn test_unauthorized_response_has_challenge() {
        let response = AccessError::authentication("missing header").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
