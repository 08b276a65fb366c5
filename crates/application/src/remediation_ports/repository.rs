use async_trait::async_trait;
use remedia_core::{AppResult, TenantId};
use remedia_domain::ActionDefinition;

use super::execution::{
    ActionExecution, ApprovalDecisionUpdate, ApprovalRequest, CreateApprovalInput,
    CreateExecutionInput, CreateRollbackInput, ExecutionListQuery, ExecutionStats,
    ExecutionTransition, RollbackRequest, RollbackResolution,
};

/// Repository port for action definitions, executions, approvals and rollbacks.
#[async_trait]
pub trait RemediationRepository: Send + Sync {
    /// Creates or updates one action definition.
    async fn save_definition(
        &self,
        tenant_id: TenantId,
        definition: ActionDefinition,
    ) -> AppResult<()>;

    /// Lists action definitions for a tenant.
    async fn list_definitions(&self, tenant_id: TenantId) -> AppResult<Vec<ActionDefinition>>;

    /// Returns one definition by logical name.
    async fn find_definition(
        &self,
        tenant_id: TenantId,
        logical_name: &str,
    ) -> AppResult<Option<ActionDefinition>>;

    /// Lists active definitions triggered by a pattern type.
    async fn list_active_definitions_for_pattern(
        &self,
        tenant_id: TenantId,
        pattern_type: &str,
    ) -> AppResult<Vec<ActionDefinition>>;

    /// Creates a new execution record in the created state.
    ///
    /// Fails with a conflict while another non-terminal execution holds the
    /// same fingerprint; this is the storage-level dedup backstop.
    async fn create_execution(
        &self,
        tenant_id: TenantId,
        input: CreateExecutionInput,
    ) -> AppResult<ActionExecution>;

    /// Returns one execution by id.
    async fn find_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ActionExecution>>;

    /// Returns the non-terminal execution holding a fingerprint, if any.
    async fn find_active_execution_by_fingerprint(
        &self,
        tenant_id: TenantId,
        fingerprint: &str,
    ) -> AppResult<Option<ActionExecution>>;

    /// Applies one guarded state transition.
    ///
    /// Fails with an invalid-transition error when the stored state differs
    /// from the transition's expected state.
    async fn transition_execution(
        &self,
        tenant_id: TenantId,
        transition: ExecutionTransition,
    ) -> AppResult<ActionExecution>;

    /// Lists executions by tenant with optional filters.
    async fn list_executions(
        &self,
        tenant_id: TenantId,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>>;

    /// Returns aggregate execution counts.
    async fn execution_stats(&self, tenant_id: TenantId) -> AppResult<ExecutionStats>;

    /// Creates the approval request gating one execution.
    async fn create_approval(
        &self,
        tenant_id: TenantId,
        input: CreateApprovalInput,
    ) -> AppResult<ApprovalRequest>;

    /// Returns one approval request by id.
    async fn find_approval(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
    ) -> AppResult<Option<ApprovalRequest>>;

    /// Returns the approval request gating one execution, if any.
    async fn find_approval_for_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ApprovalRequest>>;

    /// Assigns one pending approval request to an expected decider.
    async fn assign_approval(
        &self,
        tenant_id: TenantId,
        approval_id: &str,
        assignee: &str,
    ) -> AppResult<ApprovalRequest>;

    /// Records the terminal decision on one pending approval request.
    async fn decide_approval(
        &self,
        tenant_id: TenantId,
        update: ApprovalDecisionUpdate,
    ) -> AppResult<ApprovalRequest>;

    /// Opens a rollback request against one execution.
    ///
    /// Fails with a conflict while another active rollback request exists
    /// for the same execution.
    async fn create_rollback(
        &self,
        tenant_id: TenantId,
        input: CreateRollbackInput,
    ) -> AppResult<RollbackRequest>;

    /// Returns one rollback request by id.
    async fn find_rollback(
        &self,
        tenant_id: TenantId,
        rollback_id: &str,
    ) -> AppResult<Option<RollbackRequest>>;

    /// Returns the active rollback request for one execution, if any.
    async fn find_active_rollback_for_execution(
        &self,
        tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<RollbackRequest>>;

    /// Applies the terminal resolution to one pending rollback request.
    async fn resolve_rollback(
        &self,
        tenant_id: TenantId,
        resolution: RollbackResolution,
    ) -> AppResult<RollbackRequest>;
}
