//! Audit events for credential lifecycle and access decisions
//!
//! Events are handed to an [`AuditSink`] on a detached task. Shipping them to
//! a log service is the sink's job; a slow or failing sink never delays or
//! fails the request that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

/// Audit sink errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Client management
    ClientCreated,
    ClientDisabled,
    ClientEnabled,

    // Credential issuance
    CodeIssued,
    TokenIssued,
    TokenRefreshed,
    TokenRevoked,

    // Security events
    CredentialReuse,
    AuthFailure,
    AccessDenied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
}

/// Audit event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub id: String,

    /// Event timestamp in UTC
    pub timestamp: DateTime<Utc>,

    pub event_type: AuditEventType,

    pub severity: AuditSeverity,

    /// User, client or system identifier
    pub actor: Option<String>,

    /// Resource being acted upon (client id, route, ...)
    pub resource: Option<String>,

    /// Event description
    pub message: String,

    /// Additional structured data
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, severity: AuditSeverity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            severity,
            actor: None,
            resource: None,
            message: message.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(ref mut map) = self.metadata {
            map.insert(key.to_string(), value);
        }
        self
    }
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events as JSON lines through `tracing` under the `audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let line = serde_json::to_string(&event)?;
        info!(target: "audit", event = %line);
        Ok(())
    }
}

/// Keeps events in memory; for tests and local inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .map_err(|_| AuditError::Unavailable("event buffer poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Fire-and-forget front end for an [`AuditSink`]
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Logger backed by [`TracingAuditSink`]
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    /// Dispatch an event on a detached task.
    ///
    /// The task is not tied to the caller, so cancelling the originating
    /// request does not cancel delivery.
    pub fn record(&self, event: AuditEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event_type = ?event.event_type, "No runtime available, audit event dropped");
            return;
        };

        let sink = Arc::clone(&self.sink);
        runtime.spawn(async move {
            let event_type = event.event_type;
            if let Err(e) = sink.record(event).await {
                warn!(?event_type, "Failed to record audit event: {}", e);
            }
        });
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}
