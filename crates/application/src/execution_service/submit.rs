use super::*;

enum DedupOutcome {
    Existing(ActionExecution),
    Created(ActionExecution),
}

impl ExecutionService {
    /// Submits one execution for a definition and trigger instance.
    ///
    /// Submission is idempotent per fingerprint: while an execution for the
    /// same (definition, trigger instance) pair is non-terminal, that record
    /// is returned instead of creating a new one. Once it reaches a terminal
    /// state, a later submission with the same fingerprint starts a fresh
    /// execution and a fresh audit record.
    pub async fn submit(
        &self,
        actor: &ActorIdentity,
        input: SubmitExecutionInput,
    ) -> AppResult<ActionExecution> {
        if input.trigger_instance_key.trim().is_empty() {
            return Err(AppError::Validation(
                "trigger_instance_key must not be empty".to_owned(),
            ));
        }

        let definition = self
            .repository
            .find_definition(actor.tenant_id(), input.definition_logical_name.as_str())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "action definition '{}' does not exist for tenant '{}'",
                    input.definition_logical_name,
                    actor.tenant_id()
                ))
            })?;

        if !definition.is_active() {
            return Err(AppError::Conflict(format!(
                "action definition '{}' is inactive and cannot spawn executions",
                definition.logical_name().as_str()
            )));
        }

        let fingerprint = ExecutionFingerprint::compute(
            actor.tenant_id(),
            definition.logical_name().as_str(),
            input.trigger_instance_key.as_str(),
        );

        if let Some(existing) = self
            .repository
            .find_active_execution_by_fingerprint(actor.tenant_id(), fingerprint.as_str())
            .await?
        {
            return Ok(existing);
        }

        let lease = self.acquire_fingerprint_lock(actor, fingerprint.as_str()).await?;
        let outcome = self
            .create_deduplicated(actor, &definition, &input, &fingerprint)
            .await;
        self.release_fingerprint_lock(&lease).await;

        match outcome? {
            DedupOutcome::Existing(execution) => Ok(execution),
            DedupOutcome::Created(execution) => {
                self.advance_from_created(actor, &definition, execution).await
            }
        }
    }

    async fn create_deduplicated(
        &self,
        actor: &ActorIdentity,
        definition: &ActionDefinition,
        input: &SubmitExecutionInput,
        fingerprint: &ExecutionFingerprint,
    ) -> AppResult<DedupOutcome> {
        if let Some(existing) = self
            .repository
            .find_active_execution_by_fingerprint(actor.tenant_id(), fingerprint.as_str())
            .await?
        {
            return Ok(DedupOutcome::Existing(existing));
        }

        let created = self
            .repository
            .create_execution(
                actor.tenant_id(),
                CreateExecutionInput {
                    definition_logical_name: definition.logical_name().as_str().to_owned(),
                    action_kind: definition.action_kind(),
                    fingerprint: fingerprint.as_str().to_owned(),
                    trigger_origin: input.trigger_origin,
                    trigger_instance_key: input.trigger_instance_key.clone(),
                    trigger_payload: input.trigger_payload.clone(),
                    initiated_by: actor.subject().to_owned(),
                    dry_run: input.dry_run,
                    action_config: definition.action_config().clone(),
                },
            )
            .await;

        match created {
            Ok(execution) => {
                self.record_audit(
                    actor,
                    AuditAction::ExecutionSubmitted,
                    "action_execution",
                    execution.execution_id.as_str(),
                    Some(format!(
                        "definition '{}' submitted via '{}' trigger (instance '{}')",
                        execution.definition_logical_name,
                        execution.trigger_origin.as_str(),
                        execution.trigger_instance_key
                    )),
                )
                .await;

                Ok(DedupOutcome::Created(execution))
            }
            // Storage-level uniqueness backstop: another submitter won the
            // race between our dedup check and the insert.
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .repository
                    .find_active_execution_by_fingerprint(actor.tenant_id(), fingerprint.as_str())
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "execution create conflicted for fingerprint '{}' but no active execution was found",
                            fingerprint.as_str()
                        ))
                    })?;

                Ok(DedupOutcome::Existing(existing))
            }
            Err(error) => Err(error),
        }
    }

    async fn advance_from_created(
        &self,
        actor: &ActorIdentity,
        definition: &ActionDefinition,
        execution: ActionExecution,
    ) -> AppResult<ActionExecution> {
        let execution = self
            .repository
            .transition_execution(
                actor.tenant_id(),
                ExecutionTransition::new(
                    execution.execution_id.clone(),
                    ExecutionState::Created,
                    ExecutionState::SafetyCheck,
                ),
            )
            .await?;

        let context = SafetyContext {
            evaluated_at: Utc::now(),
            target_count: target_count(&execution.trigger_payload),
        };
        let safety = self
            .safety_validator
            .evaluate(actor.tenant_id(), definition, &context)
            .await?;

        if !safety.passed {
            return self
                .reject_unsafe(actor, &execution, ExecutionState::SafetyCheck, &safety)
                .await;
        }

        if definition.requires_approval() && !execution.dry_run {
            let approval = self
                .repository
                .create_approval(
                    actor.tenant_id(),
                    CreateApprovalInput {
                        execution_id: execution.execution_id.clone(),
                        eligible_roles: definition.approver_roles().to_vec(),
                    },
                )
                .await?;

            let pending = self
                .repository
                .transition_execution(
                    actor.tenant_id(),
                    ExecutionTransition::new(
                        execution.execution_id.clone(),
                        ExecutionState::SafetyCheck,
                        ExecutionState::PendingApproval,
                    ),
                )
                .await?;

            self.record_audit(
                actor,
                AuditAction::ExecutionAwaitingApproval,
                "approval_request",
                approval.approval_id.as_str(),
                Some(format!(
                    "execution '{}' awaits approval from roles [{}]",
                    pending.execution_id,
                    approval.eligible_roles.join(", ")
                )),
            )
            .await;

            return Ok(pending);
        }

        self.dispatch(actor, ExecutionState::SafetyCheck, execution, None)
            .await
    }

    pub(super) async fn reject_unsafe(
        &self,
        actor: &ActorIdentity,
        execution: &ActionExecution,
        from_state: ExecutionState,
        safety: &SafetyCheckResult,
    ) -> AppResult<ActionExecution> {
        let blocked_reason = safety
            .blocked_reason
            .clone()
            .unwrap_or_else(|| "blocked by safety checks".to_owned());

        let rejected = self
            .repository
            .transition_execution(
                actor.tenant_id(),
                ExecutionTransition {
                    blocked_reason: Some(blocked_reason.clone()),
                    ..ExecutionTransition::new(
                        execution.execution_id.clone(),
                        from_state,
                        ExecutionState::RejectedUnsafe,
                    )
                },
            )
            .await?;

        self.record_audit(
            actor,
            AuditAction::ExecutionRejectedUnsafe,
            "action_execution",
            rejected.execution_id.as_str(),
            Some(blocked_reason),
        )
        .await;

        Ok(rejected)
    }

    async fn acquire_fingerprint_lock(
        &self,
        actor: &ActorIdentity,
        fingerprint: &str,
    ) -> AppResult<FingerprintLease> {
        let scope_key = format!("remediation:fingerprint:{fingerprint}");
        let holder_id = actor.subject().to_owned();

        for attempt in 0..self.lock_attempts {
            if let Some(lease) = self
                .lock_coordinator
                .try_acquire(
                    scope_key.as_str(),
                    holder_id.as_str(),
                    FINGERPRINT_LOCK_LEASE_SECONDS,
                )
                .await?
            {
                return Ok(lease);
            }

            if attempt + 1 < self.lock_attempts {
                tokio::time::sleep(Duration::from_millis(self.lock_retry_delay_ms)).await;
            }
        }

        Err(AppError::Conflict(format!(
            "could not acquire submission lock for fingerprint '{fingerprint}'"
        )))
    }

    async fn release_fingerprint_lock(&self, lease: &FingerprintLease) {
        if let Err(error) = self.lock_coordinator.release(lease).await {
            warn!(
                scope_key = %lease.scope_key,
                error = %error,
                "failed to release fingerprint lock"
            );
        }
    }
}
