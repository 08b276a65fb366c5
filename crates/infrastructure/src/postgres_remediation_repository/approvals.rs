use super::*;

const APPROVAL_COLUMNS: &str = r#"
    id,
    execution_id,
    eligible_roles,
    assigned_to,
    decision,
    decided_by,
    decision_reason,
    modifications,
    created_at,
    decided_at
"#;

impl PostgresRemediationRepository {
    pub(super) async fn create_approval_impl(
        &self,
        tenant_id: TenantId,
        input: CreateApprovalInput,
    ) -> AppResult<ApprovalRequest> {
        let execution_id = parse_uuid(input.execution_id.as_str(), "execution id")?;
        let eligible_roles = serde_json::to_value(&input.eligible_roles).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode eligible roles for execution '{execution_id}': {error}"
            ))
        })?;

        let sql = format!(
            r#"
            INSERT INTO remediation_approval_requests (
                tenant_id,
                execution_id,
                eligible_roles,
                decision,
                created_at
            )
            VALUES ($1, $2, $3, 'pending', now())
            RETURNING {APPROVAL_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ApprovalRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .bind(eligible_roles)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to create approval request for execution '{execution_id}': {error}"
                ))
            })?;

        approval_from_row(row)
    }

    pub(super) async fn find_approval_impl(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        let approval_id = parse_uuid(approval_id, "approval id")?;
        let sql = format!(
            r#"
            SELECT {APPROVAL_COLUMNS}
            FROM remediation_approval_requests
            WHERE tenant_id = $1 AND id = $2
            "#
        );

        let row = sqlx::query_as::<_, ApprovalRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(approval_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load approval request '{approval_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(approval_from_row).transpose()
    }

    pub(super) async fn find_approval_for_execution_impl(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        let execution_id = parse_uuid(execution_id, "execution id")?;
        let sql = format!(
            r#"
            SELECT {APPROVAL_COLUMNS}
            FROM remediation_approval_requests
            WHERE tenant_id = $1 AND execution_id = $2
            "#
        );

        let row = sqlx::query_as::<_, ApprovalRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load approval request for execution '{execution_id}': {error}"
                ))
            })?;

        row.map(approval_from_row).transpose()
    }

    pub(super) async fn assign_approval_impl(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
        assignee: &str,
    ) -> AppResult<ApprovalRequest> {
        let approval_uuid = parse_uuid(approval_id, "approval id")?;
        let sql = format!(
            r#"
            UPDATE remediation_approval_requests
            SET assigned_to = $3
            WHERE tenant_id = $1 AND id = $2 AND decision = 'pending'
            RETURNING {APPROVAL_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ApprovalRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(approval_uuid)
            .bind(assignee)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to assign approval request '{approval_uuid}': {error}"
                ))
            })?;

        match row {
            Some(row) => approval_from_row(row),
            None => Err(self.approval_guard_error(tenant_id, approval_id).await),
        }
    }

    pub(super) async fn decide_approval_impl(
        &self,
        tenant_id: TenantId,
        update: ApprovalDecisionUpdate,
    ) -> AppResult<ApprovalRequest> {
        let approval_uuid = parse_uuid(update.approval_id.as_str(), "approval id")?;
        let sql = format!(
            r#"
            UPDATE remediation_approval_requests
            SET
                decision = $3,
                decided_by = $4,
                decision_reason = $5,
                modifications = $6,
                decided_at = now()
            WHERE tenant_id = $1 AND id = $2 AND decision = 'pending'
            RETURNING {APPROVAL_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ApprovalRow>(sql.as_str())
            .bind(tenant_id.as_uuid())
            .bind(approval_uuid)
            .bind(update.decision.as_str())
            .bind(update.decided_by.as_str())
            .bind(&update.reason)
            .bind(&update.modifications)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to decide approval request '{approval_uuid}': {error}"
                ))
            })?;

        match row {
            Some(row) => approval_from_row(row),
            None => Err(self
                .approval_guard_error(tenant_id, update.approval_id.as_str())
                .await),
        }
    }

    async fn approval_guard_error(&self, tenant_id: TenantId, approval_id: &str) -> AppError {
        match self.find_approval_impl(tenant_id, approval_id).await {
            Ok(Some(approval)) => AppError::InvalidTransition(format!(
                "approval request '{approval_id}' is already '{}'",
                approval.decision.as_str()
            )),
            Ok(None) => {
                AppError::NotFound(format!("approval request '{approval_id}' does not exist"))
            }
            Err(error) => error,
        }
    }
}
