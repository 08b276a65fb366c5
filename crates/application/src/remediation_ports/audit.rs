use async_trait::async_trait;
use remedia_core::{AppResult, TenantId};
use remedia_domain::AuditAction;
use tracing::warn;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Tenant scope for the event.
    pub tenant_id: TenantId,
    /// Subject that performed the action.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Appends one audit event without letting a sink failure abort the caller's
/// state transition; failures are logged and swallowed.
pub(crate) async fn append_best_effort(repository: &dyn AuditRepository, event: AuditEvent) {
    let action = event.action.as_str();
    let resource_id = event.resource_id.clone();

    if let Err(error) = repository.append_event(event).await {
        warn!(
            action,
            resource_id = %resource_id,
            error = %error,
            "failed to append audit event"
        );
    }
}
