use super::*;

impl PostgresRemediationRepository {
    pub(super) async fn save_definition_impl(
        &self,
        tenant_id: TenantId,
        definition: ActionDefinition,
    ) -> AppResult<()> {
        let trigger = serde_json::to_value(definition.trigger()).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode trigger for definition '{}': {error}",
                definition.logical_name().as_str()
            ))
        })?;
        let approver_roles =
            serde_json::to_value(definition.approver_roles()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to encode approver roles for definition '{}': {error}",
                    definition.logical_name().as_str()
                ))
            })?;

        sqlx::query(
            r#"
            INSERT INTO remediation_action_definitions (
                tenant_id,
                logical_name,
                display_name,
                description,
                trigger,
                action_kind,
                action_config,
                requires_approval,
                approver_roles,
                is_active,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            ON CONFLICT (tenant_id, logical_name)
            DO UPDATE SET
                display_name = EXCLUDED.display_name,
                description = EXCLUDED.description,
                trigger = EXCLUDED.trigger,
                action_kind = EXCLUDED.action_kind,
                action_config = EXCLUDED.action_config,
                requires_approval = EXCLUDED.requires_approval,
                approver_roles = EXCLUDED.approver_roles,
                is_active = EXCLUDED.is_active,
                updated_at = now()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(definition.logical_name().as_str())
        .bind(definition.display_name().as_str())
        .bind(definition.description())
        .bind(trigger)
        .bind(definition.action_kind().as_str())
        .bind(definition.action_config())
        .bind(definition.requires_approval())
        .bind(approver_roles)
        .bind(definition.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save action definition '{}' for tenant '{}': {error}",
                definition.logical_name().as_str(),
                tenant_id
            ))
        })?;

        Ok(())
    }

    pub(super) async fn list_definitions_impl(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Vec<ActionDefinition>> {
        let rows = sqlx::query_as::<_, DefinitionRow>(
            r#"
            SELECT
                logical_name,
                display_name,
                description,
                trigger,
                action_kind,
                action_config,
                requires_approval,
                approver_roles,
                is_active
            FROM remediation_action_definitions
            WHERE tenant_id = $1
            ORDER BY logical_name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list action definitions for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(definition_from_row).collect()
    }

    pub(super) async fn find_definition_impl(
        &self,
        tenant_id: TenantId,
        logical_name: &str,
    ) -> AppResult<Option<ActionDefinition>> {
        let row = sqlx::query_as::<_, DefinitionRow>(
            r#"
            SELECT
                logical_name,
                display_name,
                description,
                trigger,
                action_kind,
                action_config,
                requires_approval,
                approver_roles,
                is_active
            FROM remediation_action_definitions
            WHERE tenant_id = $1 AND logical_name = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(logical_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load action definition '{logical_name}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(definition_from_row).transpose()
    }

    pub(super) async fn list_active_definitions_for_pattern_impl(
        &self,
        tenant_id: TenantId,
        pattern_type: &str,
    ) -> AppResult<Vec<ActionDefinition>> {
        let rows = sqlx::query_as::<_, DefinitionRow>(
            r#"
            SELECT
                logical_name,
                display_name,
                description,
                trigger,
                action_kind,
                action_config,
                requires_approval,
                approver_roles,
                is_active
            FROM remediation_action_definitions
            WHERE tenant_id = $1
              AND is_active = TRUE
              AND trigger ->> 'type' = 'pattern'
              AND trigger ->> 'pattern_type' = $2
            ORDER BY logical_name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(pattern_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list pattern-triggered definitions for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(definition_from_row).collect()
    }
}
