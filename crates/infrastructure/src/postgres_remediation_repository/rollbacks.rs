use super::*;

const ROLLBACK_COLUMNS: &str = r#"
    id,
    execution_id,
    requested_by,
    reason,
    eligibility_note,
    status,
    decided_by,
    decision_reason,
    inverse_result,
    failure_reason,
    created_at,
    decided_at
"#;

impl PostgresRemediationRepository {
    pub(super) async fn create_rollback_impl(
        &self,
        tenant_id: TenantId,
        input: CreateRollbackInput,
    ) -> AppResult<RollbackRequest> {
        let execution_id = parse_uuid(input.execution_id.as_str(), "execution id")?;

        // The guarded insert plus the partial unique index on active rows
        // keeps at most one pending rollback request per execution.
        let sql = format!(
            r#"
            INSERT INTO remediation_rollback_requests (
                tenant_id,
                execution_id,
                requested_by,
                reason,
                eligibility_note,
                status,
                created_at
            )
            SELECT $1, $2, $3, $4, $5, 'pending', now()
            WHERE NOT EXISTS (
                SELECT 1
                FROM remediation_rollback_requests
                WHERE tenant_id = $1 AND execution_id = $2 AND status = 'pending'
            )
            RETURNING {ROLLBACK_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, RollbackRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .bind(input.requested_by.as_str())
            .bind(input.reason.as_str())
            .bind(input.eligibility_note.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                if error
                    .as_database_error()
                    .is_some_and(|db_error| db_error.is_unique_violation())
                {
                    AppError::Conflict(format!(
                        "execution '{execution_id}' already has an active rollback request"
                    ))
                } else {
                    AppError::Internal(format!(
                        "failed to create rollback request for execution '{execution_id}': {error}"
                    ))
                }
            })?;

        match row {
            Some(row) => rollback_from_row(row),
            None => Err(AppError::Conflict(format!(
                "execution '{execution_id}' already has an active rollback request"
            ))),
        }
    }

    pub(super) async fn find_rollback_impl(
        &self,
        tenant_id: TenantId,
        rollback_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        let rollback_id = parse_uuid(rollback_id, "rollback id")?;
        let sql = format!(
            r#"
            SELECT {ROLLBACK_COLUMNS}
            FROM remediation_rollback_requests
            WHERE tenant_id = $1 AND id = $2
            "#
        );

        let row = sqlx::query_as::<_, RollbackRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(rollback_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load rollback request '{rollback_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(rollback_from_row).transpose()
    }

    pub(super) async fn find_active_rollback_for_execution_impl(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        let execution_id = parse_uuid(execution_id, "execution id")?;
        let sql = format!(
            r#"
            SELECT {ROLLBACK_COLUMNS}
            FROM remediation_rollback_requests
            WHERE tenant_id = $1 AND execution_id = $2 AND status = 'pending'
            "#
        );

        let row = sqlx::query_as::<_, RollbackRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load active rollback request for execution '{execution_id}': {error}"
                ))
            })?;

        row.map(rollback_from_row).transpose()
    }

    pub(super) async fn resolve_rollback_impl(
        &self,
        tenant_id: TenantId,
        resolution: RollbackResolution,
    ) -> AppResult<RollbackRequest> {
        let rollback_uuid = parse_uuid(resolution.rollback_id.as_str(), "rollback id")?;
        let sql = format!(
            r#"
            UPDATE remediation_rollback_requests
            SET
                status = $3,
                decided_by = $4,
                decision_reason = $5,
                inverse_result = $6,
                failure_reason = $7,
                decided_at = now()
            WHERE tenant_id = $1 AND id = $2 AND status = 'pending'
            RETURNING {ROLLBACK_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, RollbackRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(rollback_uuid)
            .bind(resolution.status.as_str())
            .bind(resolution.decided_by.as_str())
            .bind(&resolution.decision_reason)
            .bind(&resolution.inverse_result)
            .bind(&resolution.failure_reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to resolve rollback request '{rollback_uuid}': {error}"
                ))
            })?;

        match row {
            Some(row) => rollback_from_row(row),
            None => {
                match self
                    .find_rollback_impl(tenant_id, resolution.rollback_id.as_str())
                    .await?
                {
                    Some(request) => Err(AppError::InvalidTransition(format!(
                        "rollback request '{}' is already '{}'",
                        resolution.rollback_id,
                        request.status.as_str()
                    ))),
                    None => Err(AppError::NotFound(format!(
                        "rollback request '{}' does not exist",
                        resolution.rollback_id
                    ))),
                }
            }
        }
    }
}
