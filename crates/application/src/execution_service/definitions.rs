use remedia_domain::ActionDefinitionInput;

use super::*;

impl ExecutionService {
    /// Creates or updates one action definition.
    ///
    /// Edits never retroactively change in-flight executions; approvals keep
    /// the role snapshot taken when they were created.
    pub async fn save_definition(
        &self,
        actor: &ActorIdentity,
        input: ActionDefinitionInput,
    ) -> AppResult<ActionDefinition> {
        let definition = ActionDefinition::new(input)?;

        self.repository
            .save_definition(actor.tenant_id(), definition.clone())
            .await?;

        self.record_audit(
            actor,
            AuditAction::ActionDefinitionSaved,
            "action_definition",
            definition.logical_name().as_str(),
            Some(format!(
                "definition '{}' saved (kind '{}', approval {})",
                definition.logical_name().as_str(),
                definition.action_kind().as_str(),
                if definition.requires_approval() {
                    "required"
                } else {
                    "not required"
                }
            )),
        )
        .await;

        Ok(definition)
    }

    /// Lists action definitions for the actor's tenant.
    pub async fn list_definitions(&self, actor: &ActorIdentity) -> AppResult<Vec<ActionDefinition>> {
        self.repository.list_definitions(actor.tenant_id()).await
    }

    /// Returns one action definition by logical name.
    pub async fn get_definition(
        &self,
        actor: &ActorIdentity,
        logical_name: &str,
    ) -> AppResult<ActionDefinition> {
        self.repository
            .find_definition(actor.tenant_id(), logical_name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "action definition '{logical_name}' does not exist for tenant '{}'",
                    actor.tenant_id()
                ))
            })
    }
}
