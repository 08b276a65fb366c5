use async_trait::async_trait;
use sqlx::PgPool;

use remedia_application::{
    ActionExecution, ApprovalDecisionUpdate, ApprovalRequest, CreateApprovalInput,
    CreateExecutionInput, CreateRollbackInput, ExecutionListQuery, ExecutionStats,
    ExecutionTransition, ExecutionUsageSource, RemediationRepository, RollbackRequest,
    RollbackResolution,
};
use remedia_core::{AppError, AppResult, TenantId};
use remedia_domain::ActionDefinition;

mod approvals;
mod bindings;
mod definitions;
mod executions;
mod rollbacks;

use bindings::{
    ApprovalRow, DefinitionRow, ExecutionRow, RollbackRow, StatsRow, approval_from_row,
    definition_from_row, execution_from_row, parse_uuid, rollback_from_row,
};

/// PostgreSQL-backed remediation repository.
#[derive(Clone)]
pub struct PostgresRemediationRepository {
    pool: PgPool,
}

impl PostgresRemediationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RemediationRepository for PostgresRemediationRepository {
    async fn save_definition(
        &self,
        tenant_id: TenantId,
        definition: ActionDefinition,
    ) -> AppResult<()> {
        self.save_definition_impl(tenant_id, definition).await
    }

    async fn list_definitions(&self, tenant_id: TenantId) -> AppResult<Vec<ActionDefinition>> {
        self.list_definitions_impl(tenant_id).await
    }

    async fn find_definition(
        &self,
        tenant_id: TenantId,
        logical_name: &str,
    ) -> AppResult<Option<ActionDefinition>> {
        self.find_definition_impl(tenant_id, logical_name).await
    }

    async fn list_active_definitions_for_pattern(
        &self,
        tenant_id: TenantId,
        pattern_type: &str,
    ) -> AppResult<Vec<ActionDefinition>> {
        self.list_active_definitions_for_pattern_impl(tenant_id, pattern_type)
            .await
    }

    async fn create_execution(
        &self,
        tenant_id: TenantId,
        input: CreateExecutionInput,
    ) -> AppResult<ActionExecution> {
        self.create_execution_impl(tenant_id, input).await
    }

    async fn find_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ActionExecution>> {
        self.find_execution_impl(tenant_id, execution_id).await
    }

    async fn find_active_execution_by_fingerprint(
        &self,
        tenant_id: TenantId,
        fingerprint: &str,
    ) -> AppResult<Option<ActionExecution>> {
        self.find_active_execution_by_fingerprint_impl(tenant_id, fingerprint)
            .await
    }

    async fn transition_execution(
        &self,
        tenant_id: TenantId,
        transition: ExecutionTransition,
    ) -> AppResult<ActionExecution> {
        self.transition_execution_impl(tenant_id, transition).await
    }

    async fn list_executions(
        &self,
        tenant_id: TenantId,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        self.list_executions_impl(tenant_id, query).await
    }

    async fn execution_stats(&self, tenant_id: TenantId) -> AppResult<ExecutionStats> {
        self.execution_stats_impl(tenant_id).await
    }

    async fn create_approval(
        &self,
        tenant_id: TenantId,
        input: CreateApprovalInput,
    ) -> AppResult<ApprovalRequest> {
        self.create_approval_impl(tenant_id, input).await
    }

    async fn find_approval(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        self.find_approval_impl(tenant_id, approval_id).await
    }

    async fn find_approval_for_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        self.find_approval_for_execution_impl(tenant_id, execution_id)
            .await
    }

    async fn assign_approval(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
        assignee: &str,
    ) -> AppResult<ApprovalRequest> {
        self.assign_approval_impl(tenant_id, approval_id, assignee)
            .await
    }

    async fn decide_approval(
        &self,
        tenant_id: TenantId,
        update: ApprovalDecisionUpdate,
    ) -> AppResult<ApprovalRequest> {
        self.decide_approval_impl(tenant_id, update).await
    }

    async fn create_rollback(
        &self,
        tenant_id: TenantId,
        input: CreateRollbackInput,
    ) -> AppResult<RollbackRequest> {
        self.create_rollback_impl(tenant_id, input).await
    }

    async fn find_rollback(
        &self,
        tenant_id: TenantId,
        rollback_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        self.find_rollback_impl(tenant_id, rollback_id).await
    }

    async fn find_active_rollback_for_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        self.find_active_rollback_for_execution_impl(tenant_id, execution_id)
            .await
    }

    async fn resolve_rollback(
        &self,
        tenant_id: TenantId,
        resolution: RollbackResolution,
    ) -> AppResult<RollbackRequest> {
        self.resolve_rollback_impl(tenant_id, resolution).await
    }
}

#[async_trait]
impl ExecutionUsageSource for PostgresRemediationRepository {
    async fn count_executions_started_since(
        &self,
        tenant_id: TenantId,
        definition_logical_name: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT count(*)
            FROM remediation_executions
            WHERE tenant_id = $1
              AND definition_logical_name = $2
              AND execution_started_at >= $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(definition_logical_name)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count recent executions of '{definition_logical_name}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(count.0)
    }
}
