use std::sync::Arc;

use remedia_core::{ActorIdentity, AppError, AppResult};
use remedia_domain::AuditAction;
use serde::Serialize;

use crate::remediation_ports::{
    ActionExecution, ActionReverseRequest, ActionRunnerRegistry, AuditEvent, AuditRepository,
    CreateRollbackInput, ExecutionState, ExecutionTransition, RemediationRepository,
    RollbackRequest, RollbackResolution, RollbackStatus, append_best_effort,
};

/// Eligibility verdict for rolling back one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackEligibility {
    /// Whether a rollback request would be accepted.
    pub eligible: bool,
    /// Explanation of the verdict.
    pub reason: String,
}

impl RollbackEligibility {
    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
        }
    }
}

/// Rollback coordinator managing compensating actions for completed
/// executions.
///
/// Operates on already-terminal executions only, independently of the
/// forward execution path.
#[derive(Clone)]
pub struct RollbackService {
    repository: Arc<dyn RemediationRepository>,
    runner_registry: Arc<ActionRunnerRegistry>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RollbackService {
    /// Creates a rollback service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RemediationRepository>,
        runner_registry: Arc<ActionRunnerRegistry>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            repository,
            runner_registry,
            audit_repository,
        }
    }

    /// Evaluates whether one execution can be rolled back.
    pub async fn check_eligibility(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
    ) -> AppResult<RollbackEligibility> {
        let execution = self.get_execution(actor, execution_id).await?;
        self.eligibility_of(actor, &execution).await
    }

    /// Opens a rollback request against one completed execution.
    pub async fn request_rollback(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
        reason: &str,
    ) -> AppResult<RollbackRequest> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "rollback reason must not be empty".to_owned(),
            ));
        }

        let execution = self.get_execution(actor, execution_id).await?;
        let eligibility = self.eligibility_of(actor, &execution).await?;
        if !eligibility.eligible {
            return Err(AppError::Conflict(format!(
                "execution '{execution_id}' is not eligible for rollback: {}",
                eligibility.reason
            )));
        }

        let request = self
            .repository
            .create_rollback(
                actor.tenant_id(),
                CreateRollbackInput {
                    execution_id: execution_id.to_owned(),
                    requested_by: actor.subject().to_owned(),
                    reason: reason.to_owned(),
                    eligibility_note: eligibility.reason,
                },
            )
            .await?;

        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action: AuditAction::RollbackRequested,
                resource_type: "rollback_request".to_owned(),
                resource_id: request.rollback_id.clone(),
                detail: Some(format!(
                    "rollback of execution '{execution_id}' requested: {reason}"
                )),
            },
        )
        .await;

        Ok(request)
    }

    /// Approves one pending rollback request and runs the inverse operation.
    ///
    /// When the inverse succeeds the execution moves to rolled back and the
    /// request links to it; when it fails the request records the failure
    /// and the execution's forward state is left untouched.
    pub async fn approve_rollback(
        &self,
        actor: &ActorIdentity,
        rollback_id: &str,
        reason: Option<String>,
    ) -> AppResult<RollbackRequest> {
        let request = self.get_pending_rollback(actor, rollback_id).await?;
        let execution = self
            .get_execution(actor, request.execution_id.as_str())
            .await?;

        if execution.state != ExecutionState::Completed {
            return Err(AppError::InvalidTransition(format!(
                "execution '{}' is '{}', only completed executions can be rolled back",
                execution.execution_id,
                execution.state.as_str()
            )));
        }

        let runner = self.runner_registry.runner_for(execution.action_kind)?;
        if !runner.supports_reverse() {
            return Err(AppError::Conflict(format!(
                "action kind '{}' has no reversible runner",
                execution.action_kind.as_str()
            )));
        }

        let original_result = execution.result.clone().ok_or_else(|| {
            AppError::Internal(format!(
                "completed execution '{}' has no result payload",
                execution.execution_id
            ))
        })?;

        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action: AuditAction::RollbackDecided,
                resource_type: "rollback_request".to_owned(),
                resource_id: rollback_id.to_owned(),
                detail: Some(format!(
                    "rollback of execution '{}' approved by '{}'",
                    execution.execution_id,
                    actor.subject()
                )),
            },
        )
        .await;

        let reverse_result = runner
            .reverse(ActionReverseRequest {
                tenant_id: actor.tenant_id(),
                execution_id: execution.execution_id.clone(),
                action_kind: execution.action_kind,
                config: execution.action_config.clone(),
                original_result,
            })
            .await;

        match reverse_result {
            Ok(inverse_result) => {
                let resolved = self
                    .repository
                    .resolve_rollback(
                        actor.tenant_id(),
                        RollbackResolution {
                            rollback_id: rollback_id.to_owned(),
                            status: RollbackStatus::Completed,
                            decided_by: actor.subject().to_owned(),
                            decision_reason: reason,
                            inverse_result: Some(inverse_result),
                            failure_reason: None,
                        },
                    )
                    .await?;

                let rolled_back = self
                    .repository
                    .transition_execution(
                        actor.tenant_id(),
                        ExecutionTransition {
                            rollback_id: Some(resolved.rollback_id.clone()),
                            ..ExecutionTransition::new(
                                execution.execution_id.clone(),
                                ExecutionState::Completed,
                                ExecutionState::RolledBack,
                            )
                        },
                    )
                    .await?;

                append_best_effort(
                    self.audit_repository.as_ref(),
                    AuditEvent {
                        tenant_id: actor.tenant_id(),
                        subject: actor.subject().to_owned(),
                        action: AuditAction::ExecutionRolledBack,
                        resource_type: "action_execution".to_owned(),
                        resource_id: rolled_back.execution_id.clone(),
                        detail: Some(format!(
                            "rolled back via rollback request '{}'",
                            resolved.rollback_id
                        )),
                    },
                )
                .await;

                Ok(resolved)
            }
            Err(error) => {
                // A failed inverse must stay visible as a failed rollback;
                // the execution keeps its completed state.
                let failed = self
                    .repository
                    .resolve_rollback(
                        actor.tenant_id(),
                        RollbackResolution {
                            rollback_id: rollback_id.to_owned(),
                            status: RollbackStatus::Failed,
                            decided_by: actor.subject().to_owned(),
                            decision_reason: reason,
                            inverse_result: None,
                            failure_reason: Some(error.to_string()),
                        },
                    )
                    .await?;

                append_best_effort(
                    self.audit_repository.as_ref(),
                    AuditEvent {
                        tenant_id: actor.tenant_id(),
                        subject: actor.subject().to_owned(),
                        action: AuditAction::RollbackFailed,
                        resource_type: "rollback_request".to_owned(),
                        resource_id: failed.rollback_id.clone(),
                        detail: Some(format!(
                            "inverse operation for execution '{}' failed: {error}",
                            execution.execution_id
                        )),
                    },
                )
                .await;

                Ok(failed)
            }
        }
    }

    /// Rejects one pending rollback request.
    pub async fn reject_rollback(
        &self,
        actor: &ActorIdentity,
        rollback_id: &str,
        reason: Option<String>,
    ) -> AppResult<RollbackRequest> {
        let request = self.get_pending_rollback(actor, rollback_id).await?;

        let rejected = self
            .repository
            .resolve_rollback(
                actor.tenant_id(),
                RollbackResolution {
                    rollback_id: rollback_id.to_owned(),
                    status: RollbackStatus::Rejected,
                    decided_by: actor.subject().to_owned(),
                    decision_reason: reason.clone(),
                    inverse_result: None,
                    failure_reason: None,
                },
            )
            .await?;

        let reason_suffix = reason
            .as_deref()
            .map(|reason| format!(": {reason}"))
            .unwrap_or_default();
        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action: AuditAction::RollbackDecided,
                resource_type: "rollback_request".to_owned(),
                resource_id: rejected.rollback_id.clone(),
                detail: Some(format!(
                    "rollback of execution '{}' rejected by '{}'{reason_suffix}",
                    request.execution_id,
                    actor.subject()
                )),
            },
        )
        .await;

        Ok(rejected)
    }

    async fn eligibility_of(
        &self,
        actor: &ActorIdentity,
        execution: &ActionExecution,
    ) -> AppResult<RollbackEligibility> {
        if execution.state == ExecutionState::RolledBack {
            return Ok(RollbackEligibility::blocked(
                "execution has already been rolled back",
            ));
        }

        if execution.state != ExecutionState::Completed {
            return Ok(RollbackEligibility::blocked(format!(
                "execution is '{}', only completed executions can be rolled back",
                execution.state.as_str()
            )));
        }

        if execution.dry_run {
            return Ok(RollbackEligibility::blocked(
                "dry-run executions leave no side effect to roll back",
            ));
        }

        if !self.runner_registry.supports_reverse(execution.action_kind) {
            return Ok(RollbackEligibility::blocked(format!(
                "action kind '{}' has no reversible runner",
                execution.action_kind.as_str()
            )));
        }

        if let Some(active) = self
            .repository
            .find_active_rollback_for_execution(actor.tenant_id(), execution.execution_id.as_str())
            .await?
        {
            return Ok(RollbackEligibility::blocked(format!(
                "rollback request '{}' is already pending",
                active.rollback_id
            )));
        }

        Ok(RollbackEligibility {
            eligible: true,
            reason: format!(
                "action kind '{}' supports reverse",
                execution.action_kind.as_str()
            ),
        })
    }

    async fn get_execution(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
    ) -> AppResult<ActionExecution> {
        self.repository
            .find_execution(actor.tenant_id(), execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("execution '{execution_id}' does not exist"))
            })
    }

    async fn get_pending_rollback(
        &self,
        actor: &ActorIdentity,
        rollback_id: &str,
    ) -> AppResult<RollbackRequest> {
        let request = self
            .repository
            .find_rollback(actor.tenant_id(), rollback_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("rollback request '{rollback_id}' does not exist"))
            })?;

        if request.status != RollbackStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "rollback request '{}' is already '{}'",
                request.rollback_id,
                request.status.as_str()
            )));
        }

        Ok(request)
    }
}
