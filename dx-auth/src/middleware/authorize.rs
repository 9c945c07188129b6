//! Route authorization against the endpoint permission table

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditSeverity};
use crate::error::AccessError;
use crate::models::AuthenticatedIdentity;
use crate::rbac::{Authorizer, AuthzError};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;

/// Authorization middleware; runs after [`super::AuthenticationMiddleware`].
///
/// On success the [`crate::rbac::Decision`] is added to request extensions so
/// handlers can see whether an ownership check is still owed.
#[derive(Debug, Clone)]
pub struct AuthorizationMiddleware {
    authorizer: Arc<Authorizer>,
    audit: AuditLogger,
}

impl AuthorizationMiddleware {
    pub fn new(authorizer: Arc<Authorizer>, audit: AuditLogger) -> Self {
        Self { authorizer, audit }
    }

    pub async fn process(&self, mut request: Request, next: Next) -> Result<Response, AccessError> {
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();
        let identity = request.extensions().get::<AuthenticatedIdentity>();

        match self.authorizer.authorize(identity, &method, &path) {
            Ok(decision) => {
                request.extensions_mut().insert(decision);
                Ok(next.run(request).await)
            }
            Err(AuthzError::Unauthenticated) => Err(AuthzError::Unauthenticated.into()),
            Err(e) => {
                let mut event = AuditEvent::new(
                    AuditEventType::AccessDenied,
                    AuditSeverity::Warning,
                    "Access denied",
                )
                .with_resource(path.as_str())
                .with_metadata("method", json!(method))
                .with_metadata("reason", json!(e.to_string()));
                if let Some(identity) = identity {
                    event = event.with_actor(identity.subject.as_str());
                }
                self.audit.record(event);
                Err(e.into())
            }
        }
    }
}
