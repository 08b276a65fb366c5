use std::sync::Arc;

use remedia_core::{ActorIdentity, AppError, AppResult};
use remedia_domain::AuditAction;
use serde_json::Value;

use crate::execution_service::ExecutionService;
use crate::remediation_ports::{
    ActionExecution, ApprovalDecision, ApprovalDecisionUpdate, ApprovalRequest, AuditEvent,
    AuditRepository, ExecutionState, ExecutionTransition, RemediationRepository,
    append_best_effort,
};

/// Terminal decision payload for one approval request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecisionInput {
    /// Approval request identifier.
    pub approval_id: String,
    /// Whether the execution may proceed.
    pub approved: bool,
    /// Optional human-readable decision reason.
    pub reason: Option<String>,
    /// Optional JSON-object overrides applied to the action configuration.
    pub modifications: Option<Value>,
}

/// Approval gate managing human sign-off for pending executions.
///
/// Role eligibility was fixed on the request at creation time and its
/// enforcement is the caller's authorization concern; the gate records the
/// decider identity regardless.
#[derive(Clone)]
pub struct ApprovalService {
    repository: Arc<dyn RemediationRepository>,
    execution_service: ExecutionService,
    audit_repository: Arc<dyn AuditRepository>,
}

impl ApprovalService {
    /// Creates an approval service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RemediationRepository>,
        execution_service: ExecutionService,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            repository,
            execution_service,
            audit_repository,
        }
    }

    /// Returns one approval request by id.
    pub async fn get_approval(
        &self,
        actor: &ActorIdentity,
        approval_id: &str,
    ) -> AppResult<ApprovalRequest> {
        self.repository
            .find_approval(actor.tenant_id(), approval_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("approval request '{approval_id}' does not exist"))
            })
    }

    /// Returns the approval request gating one execution.
    pub async fn get_approval_for_execution(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
    ) -> AppResult<ApprovalRequest> {
        self.repository
            .find_approval_for_execution(actor.tenant_id(), execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "execution '{execution_id}' has no approval request"
                ))
            })
    }

    /// Assigns one pending approval request to an expected decider.
    ///
    /// A side-channel operation: it never changes decision state and may be
    /// repeated to hand the request to someone else.
    pub async fn assign(
        &self,
        actor: &ActorIdentity,
        approval_id: &str,
        assignee: &str,
    ) -> AppResult<ApprovalRequest> {
        if assignee.trim().is_empty() {
            return Err(AppError::Validation(
                "assignee must not be empty".to_owned(),
            ));
        }

        let approval = self.get_approval(actor, approval_id).await?;
        if approval.decision != ApprovalDecision::Pending {
            return Err(AppError::InvalidTransition(format!(
                "approval request '{}' is already '{}'",
                approval.approval_id,
                approval.decision.as_str()
            )));
        }

        let assigned = self
            .repository
            .assign_approval(actor.tenant_id(), approval_id, assignee)
            .await?;

        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action: AuditAction::ApprovalAssigned,
                resource_type: "approval_request".to_owned(),
                resource_id: approval_id.to_owned(),
                detail: Some(format!("assigned to '{assignee}'")),
            },
        )
        .await;

        Ok(assigned)
    }

    /// Approves the pending request gating one execution, by execution id.
    pub async fn approve_execution(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
    ) -> AppResult<ActionExecution> {
        let approval = self.get_approval_for_execution(actor, execution_id).await?;

        self.decide(
            actor,
            ApprovalDecisionInput {
                approval_id: approval.approval_id,
                approved: true,
                reason: None,
                modifications: None,
            },
        )
        .await
    }

    /// Records the terminal decision for one approval request.
    ///
    /// Approval resumes the gated execution, overlaying any parameter
    /// modifications; rejection fails it with reason `approval_rejected`.
    pub async fn decide(
        &self,
        actor: &ActorIdentity,
        input: ApprovalDecisionInput,
    ) -> AppResult<ActionExecution> {
        if let Some(modifications) = &input.modifications {
            if !input.approved {
                return Err(AppError::Validation(
                    "modifications are only valid on an approving decision".to_owned(),
                ));
            }

            if !modifications.is_object() {
                return Err(AppError::Validation(
                    "approval modifications must be a JSON object".to_owned(),
                ));
            }
        }

        let approval = self.get_approval(actor, input.approval_id.as_str()).await?;
        if approval.decision != ApprovalDecision::Pending {
            return Err(AppError::InvalidTransition(format!(
                "approval request '{}' is already '{}'",
                approval.approval_id,
                approval.decision.as_str()
            )));
        }

        let decision = if input.approved {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Rejected
        };

        let decided = self
            .repository
            .decide_approval(
                actor.tenant_id(),
                ApprovalDecisionUpdate {
                    approval_id: input.approval_id.clone(),
                    decision,
                    decided_by: actor.subject().to_owned(),
                    reason: input.reason.clone(),
                    modifications: input.modifications.clone(),
                },
            )
            .await?;

        let reason_suffix = input
            .reason
            .as_deref()
            .map(|reason| format!(": {reason}"))
            .unwrap_or_default();
        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action: AuditAction::ApprovalDecided,
                resource_type: "approval_request".to_owned(),
                resource_id: decided.approval_id.clone(),
                detail: Some(format!(
                    "'{}' {} execution '{}'{reason_suffix}",
                    actor.subject(),
                    decision.as_str(),
                    decided.execution_id
                )),
            },
        )
        .await;

        if input.approved {
            self.execution_service
                .resume_approved(
                    actor,
                    decided.execution_id.as_str(),
                    decided.modifications.as_ref(),
                )
                .await
        } else {
            let failed = self
                .repository
                .transition_execution(
                    actor.tenant_id(),
                    ExecutionTransition {
                        failure_reason: Some("approval_rejected".to_owned()),
                        ..ExecutionTransition::new(
                            decided.execution_id.clone(),
                            ExecutionState::PendingApproval,
                            ExecutionState::Failed,
                        )
                    },
                )
                .await?;

            append_best_effort(
                self.audit_repository.as_ref(),
                AuditEvent {
                    tenant_id: actor.tenant_id(),
                    subject: actor.subject().to_owned(),
                    action: AuditAction::ExecutionFailed,
                    resource_type: "action_execution".to_owned(),
                    resource_id: failed.execution_id.clone(),
                    detail: Some(format!(
                        "approval rejected by '{}'{reason_suffix}",
                        actor.subject()
                    )),
                },
            )
            .await;

            Ok(failed)
        }
    }
}
