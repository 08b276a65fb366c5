use super::*;

impl ExecutionService {
    /// Moves an execution into the executing state and runs its action.
    ///
    /// `config_override` replaces the stored action configuration when an
    /// approval carried parameter modifications.
    pub(crate) async fn dispatch(
        &self,
        actor: &ActorIdentity,
        from_state: ExecutionState,
        execution: ActionExecution,
        config_override: Option<Value>,
    ) -> AppResult<ActionExecution> {
        let executing = self
            .repository
            .transition_execution(
                actor.tenant_id(),
                ExecutionTransition {
                    action_config: config_override,
                    ..ExecutionTransition::new(
                        execution.execution_id.clone(),
                        from_state,
                        ExecutionState::Executing,
                    )
                },
            )
            .await?;

        let runner = match self.runner_registry.runner_for(executing.action_kind) {
            Ok(runner) => runner,
            Err(error) => {
                return self
                    .finish_failed(actor, executing, format!("runner unavailable: {error}"))
                    .await;
            }
        };

        let mode = if executing.dry_run {
            ActionRunMode::DryRun
        } else {
            ActionRunMode::Live
        };

        let run_result = runner
            .run(ActionRunRequest {
                tenant_id: actor.tenant_id(),
                execution_id: executing.execution_id.clone(),
                action_kind: executing.action_kind,
                config: executing.action_config.clone(),
                trigger_payload: executing.trigger_payload.clone(),
                mode,
            })
            .await;

        match run_result {
            Ok(result) => self.finish_completed(actor, executing, result).await,
            Err(error) => self.finish_failed(actor, executing, error.to_string()).await,
        }
    }

    /// Resumes a pending-approval execution after an approve decision.
    pub(crate) async fn resume_approved(
        &self,
        actor: &ActorIdentity,
        execution_id: &str,
        modifications: Option<&Value>,
    ) -> AppResult<ActionExecution> {
        let execution = self
            .repository
            .find_execution(actor.tenant_id(), execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("execution '{execution_id}' does not exist"))
            })?;

        if execution.state != ExecutionState::PendingApproval {
            return Err(AppError::InvalidTransition(format!(
                "execution '{}' is '{}', expected 'pending_approval'",
                execution.execution_id,
                execution.state.as_str()
            )));
        }

        let definition = self
            .repository
            .find_definition(actor.tenant_id(), execution.definition_logical_name.as_str())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "action definition '{}' does not exist for tenant '{}'",
                    execution.definition_logical_name,
                    actor.tenant_id()
                ))
            })?;

        let config_override = match modifications {
            Some(modifications) => Some(merge_action_config(
                &execution.action_config,
                modifications,
            )?),
            None => None,
        };

        // The definition can have become newly unsafe while the approval
        // waited, e.g. through intervening rate-limit consumption.
        let context = SafetyContext {
            evaluated_at: Utc::now(),
            target_count: target_count(&execution.trigger_payload),
        };
        let safety = self
            .safety_validator
            .evaluate(actor.tenant_id(), &definition, &context)
            .await?;

        if !safety.passed {
            return self
                .reject_unsafe(actor, &execution, ExecutionState::PendingApproval, &safety)
                .await;
        }

        self.dispatch(
            actor,
            ExecutionState::PendingApproval,
            execution,
            config_override,
        )
        .await
    }

    async fn finish_completed(
        &self,
        actor: &ActorIdentity,
        executing: ActionExecution,
        result: Value,
    ) -> AppResult<ActionExecution> {
        let transition = ExecutionTransition {
            result: Some(result),
            ..ExecutionTransition::new(
                executing.execution_id.clone(),
                ExecutionState::Executing,
                ExecutionState::Completed,
            )
        };

        match self
            .repository
            .transition_execution(actor.tenant_id(), transition)
            .await
        {
            Ok(completed) => {
                let suffix = if completed.dry_run { " (dry run)" } else { "" };
                self.record_audit(
                    actor,
                    AuditAction::ExecutionCompleted,
                    "action_execution",
                    completed.execution_id.as_str(),
                    Some(format!(
                        "definition '{}' completed{suffix}",
                        completed.definition_logical_name
                    )),
                )
                .await;

                Ok(completed)
            }
            Err(AppError::InvalidTransition(_)) => {
                self.keep_concurrent_state(actor, executing, "completed").await
            }
            Err(error) => Err(error),
        }
    }

    async fn finish_failed(
        &self,
        actor: &ActorIdentity,
        executing: ActionExecution,
        failure_reason: String,
    ) -> AppResult<ActionExecution> {
        let transition = ExecutionTransition {
            failure_reason: Some(failure_reason.clone()),
            ..ExecutionTransition::new(
                executing.execution_id.clone(),
                ExecutionState::Executing,
                ExecutionState::Failed,
            )
        };

        match self
            .repository
            .transition_execution(actor.tenant_id(), transition)
            .await
        {
            Ok(failed) => {
                self.record_audit(
                    actor,
                    AuditAction::ExecutionFailed,
                    "action_execution",
                    failed.execution_id.as_str(),
                    Some(failure_reason),
                )
                .await;

                Ok(failed)
            }
            Err(AppError::InvalidTransition(_)) => {
                self.keep_concurrent_state(actor, executing, "failed").await
            }
            Err(error) => Err(error),
        }
    }

    // The runner outcome arrived after another process moved the execution
    // (a concurrent cancel); the stored state wins and the late outcome is
    // only logged.
    async fn keep_concurrent_state(
        &self,
        actor: &ActorIdentity,
        executing: ActionExecution,
        late_outcome: &str,
    ) -> AppResult<ActionExecution> {
        warn!(
            execution_id = %executing.execution_id,
            late_outcome,
            "execution state changed while the runner was in flight"
        );

        self.repository
            .find_execution(actor.tenant_id(), executing.execution_id.as_str())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "execution '{}' does not exist",
                    executing.execution_id
                ))
            })
    }
}

/// Overlays approval modifications onto an action configuration.
///
/// Shallow object merge: top-level keys from the modifications replace the
/// stored keys; the originating definition is never touched.
pub(crate) fn merge_action_config(base: &Value, modifications: &Value) -> AppResult<Value> {
    let Some(overrides) = modifications.as_object() else {
        return Err(AppError::Validation(
            "approval modifications must be a JSON object".to_owned(),
        ));
    };

    let mut merged = base.as_object().cloned().unwrap_or_default();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }

    Ok(Value::Object(merged))
}
