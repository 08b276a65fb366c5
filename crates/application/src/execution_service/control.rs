use super::*;

impl ExecutionService {
    /// Cancels one execution awaiting approval or currently executing.
    ///
    /// Cancellation is cooperative: once the runner is in flight the engine
    /// records the request but cannot guarantee the side effect stopped, and
    /// the cancellation record says so.
    pub async fn cancel(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
    ) -> AppResult<ActionExecution> {
        let execution = self
            .repository
            .find_execution(actor.tenant_id(), execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("execution '{execution_id}' does not exist"))
            })?;

        match execution.state {
            ExecutionState::PendingApproval => {
                // Close the open approval request so no decidable request
                // outlives its execution.
                if let Some(approval) = self
                    .repository
                    .find_approval_for_execution(actor.tenant_id(), execution_id)
                    .await?
                    && approval.decision == ApprovalDecision::Pending
                {
                    self.repository
                        .decide_approval(
                            actor.tenant_id(),
                            ApprovalDecisionUpdate {
                                approval_id: approval.approval_id,
                                decision: ApprovalDecision::Rejected,
                                decided_by: actor.subject().to_owned(),
                                reason: Some("execution cancelled".to_owned()),
                                modifications: None,
                            },
                        )
                        .await?;
                }

                let cancelled = self
                    .mark_cancelled(actor, execution_id, ExecutionState::PendingApproval, true)
                    .await?;

                self.record_audit(
                    actor,
                    AuditAction::ExecutionCancelled,
                    "action_execution",
                    execution_id,
                    Some("cancelled before dispatch".to_owned()),
                )
                .await;

                Ok(cancelled)
            }
            ExecutionState::Executing => {
                let cancelled = self
                    .mark_cancelled(actor, execution_id, ExecutionState::Executing, false)
                    .await?;

                self.record_audit(
                    actor,
                    AuditAction::ExecutionCancelled,
                    "action_execution",
                    execution_id,
                    Some(
                        "cancellation requested while the runner was in flight; \
                         the side effect is not guaranteed stopped"
                            .to_owned(),
                    ),
                )
                .await;

                Ok(cancelled)
            }
            other => Err(AppError::InvalidTransition(format!(
                "execution '{execution_id}' is '{}' and cannot be cancelled",
                other.as_str()
            ))),
        }
    }

    async fn mark_cancelled(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
        expected_state: ExecutionState,
        confirmed: bool,
    ) -> AppResult<ActionExecution> {
        self.repository
            .transition_execution(
                actor.tenant_id(),
                ExecutionTransition {
                    cancellation: Some(CancellationRecord {
                        requested_by: actor.subject().to_owned(),
                        requested_at: Utc::now(),
                        confirmed,
                    }),
                    ..ExecutionTransition::new(
                        execution_id.to_owned(),
                        expected_state,
                        ExecutionState::Cancelled,
                    )
                },
            )
            .await
    }
}
