use super::*;

impl ExecutionService {
    /// Submits executions for every active definition matching the detected
    /// patterns.
    ///
    /// Each submission is its own atomic unit: one member failing is logged
    /// and skipped, the rest proceed. Deduplication is exactly what
    /// [`ExecutionService::submit`] already guarantees per fingerprint.
    pub async fn execute_actions_for_patterns(
        &self,
        actor: &ActorIdentity,
        patterns: &[DetectedPattern],
        dry_run: bool,
    ) -> AppResult<Vec<ActionExecution>> {
        let mut executions = Vec::new();

        for pattern in patterns {
            if pattern.tenant_id != actor.tenant_id() {
                warn!(
                    pattern_type = %pattern.pattern_type,
                    "skipping detected pattern scoped to another tenant"
                );
                continue;
            }

            let definitions = self
                .repository
                .list_active_definitions_for_pattern(
                    actor.tenant_id(),
                    pattern.pattern_type.as_str(),
                )
                .await?;

            for definition in definitions {
                let submitted = self
                    .submit(
                        actor,
                        SubmitExecutionInput {
                            definition_logical_name: definition
                                .logical_name()
                                .as_str()
                                .to_owned(),
                            trigger_origin: TriggerOrigin::Pattern,
                            trigger_instance_key: pattern.instance_key.clone(),
                            trigger_payload: pattern.payload.clone(),
                            dry_run,
                        },
                    )
                    .await;

                match submitted {
                    Ok(execution) => executions.push(execution),
                    Err(error) => {
                        warn!(
                            definition = %definition.logical_name().as_str(),
                            pattern_type = %pattern.pattern_type,
                            error = %error,
                            "pattern-triggered submission failed"
                        );
                    }
                }
            }
        }

        Ok(executions)
    }
}
