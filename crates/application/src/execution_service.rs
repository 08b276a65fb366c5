use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use remedia_core::{ActorIdentity, AppError, AppResult};
use remedia_domain::{ActionDefinition, AuditAction, ExecutionFingerprint};
use serde_json::Value;
use tracing::warn;

use crate::remediation_ports::{
    ActionExecution, ActionRunMode, ActionRunRequest, ActionRunnerRegistry, ApprovalDecision,
    ApprovalDecisionUpdate, AuditEvent, AuditRepository, CancellationRecord, CreateApprovalInput,
    CreateExecutionInput, DetectedPattern, ExecutionListQuery, ExecutionState, ExecutionStats,
    ExecutionTransition, FingerprintLease, FingerprintLockCoordinator, RemediationRepository,
    SubmitExecutionInput, TriggerOrigin, append_best_effort,
};
use crate::safety_service::{SafetyCheckResult, SafetyContext, SafetyValidator};

mod control;
mod definitions;
mod dispatch;
mod patterns;
mod queries;
mod submit;

const FINGERPRINT_LOCK_LEASE_SECONDS: u32 = 30;

/// Execution engine owning the action execution lifecycle.
///
/// All state lives behind the repository; the service itself holds only
/// injected collaborators and can be cloned freely across request handlers.
#[derive(Clone)]
pub struct ExecutionService {
    repository: Arc<dyn RemediationRepository>,
    safety_validator: SafetyValidator,
    runner_registry: Arc<ActionRunnerRegistry>,
    lock_coordinator: Arc<dyn FingerprintLockCoordinator>,
    audit_repository: Arc<dyn AuditRepository>,
    lock_attempts: u32,
    lock_retry_delay_ms: u64,
}

impl ExecutionService {
    /// Creates an execution service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RemediationRepository>,
        safety_validator: SafetyValidator,
        runner_registry: Arc<ActionRunnerRegistry>,
        lock_coordinator: Arc<dyn FingerprintLockCoordinator>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            repository,
            safety_validator,
            runner_registry,
            lock_coordinator,
            audit_repository,
            lock_attempts: 5,
            lock_retry_delay_ms: 50,
        }
    }

    /// Overrides fingerprint lock retry behavior.
    #[must_use]
    pub fn with_lock_retry(mut self, attempts: u32, retry_delay_ms: u64) -> Self {
        self.lock_attempts = attempts.max(1);
        self.lock_retry_delay_ms = retry_delay_ms;
        self
    }

    async fn record_audit(
        &self,
        actor: &ActorIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        detail: Option<String>,
    ) {
        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id: resource_id.to_owned(),
                detail,
            },
        )
        .await;
    }
}

/// Derives how many targets an execution would touch from its trigger payload.
fn target_count(trigger_payload: &Value) -> u64 {
    trigger_payload
        .get("targets")
        .and_then(Value::as_array)
        .map_or(1, |targets| {
            u64::try_from(targets.len()).unwrap_or(u64::MAX)
        })
}

#[cfg(test)]
mod tests;
