use super::*;

impl ExecutionService {
    /// Returns one execution by id.
    pub async fn get_execution(
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

    /// Lists executions for the actor's tenant with optional filters.
    pub async fn list_executions(
        &self,
        actor: &ActorIdentity,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        if query.limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        self.repository
            .list_executions(actor.tenant_id(), query)
            .await
    }

    /// Returns aggregate execution counts for the actor's tenant.
    pub async fn execution_stats(&self, actor: &ActorIdentity) -> AppResult<ExecutionStats> {
        self.repository.execution_stats(actor.tenant_id()).await
    }

    /// Evaluates safety for a definition without creating an execution.
    ///
    /// Read-only pre-check used by manual trigger surfaces before they
    /// commit to a submission.
    pub async fn evaluate_definition_safety(
        &self,
        actor: &ActorIdentity,
        definition_logical_name: &str,
        trigger_payload: &Value,
    ) -> AppResult<SafetyCheckResult> {
        let definition = self.get_definition(actor, definition_logical_name).await?;

        let context = SafetyContext {
            evaluated_at: Utc::now(),
            target_count: target_count(trigger_payload),
        };

        self.safety_validator
            .evaluate(actor.tenant_id(), &definition, &context)
            .await
    }
}
