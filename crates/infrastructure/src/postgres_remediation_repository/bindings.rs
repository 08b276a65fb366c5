use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use remedia_application::{
    ActionExecution, ApprovalDecision, ApprovalRequest, CancellationRecord, ExecutionState,
    ExecutionStats, RollbackRequest, RollbackStatus, TriggerOrigin,
};
use remedia_core::{AppError, AppResult};
use remedia_domain::{ActionDefinition, ActionDefinitionInput, ActionKind, ActionTrigger};

#[derive(Debug, FromRow)]
pub(super) struct DefinitionRow {
    pub(super) logical_name: String,
    pub(super) display_name: String,
    pub(super) description: Option<String>,
    pub(super) trigger: Value,
    pub(super) action_kind: String,
    pub(super) action_config: Value,
    pub(super) requires_approval: bool,
    pub(super) approver_roles: Value,
    pub(super) is_active: bool,
}

#[derive(Debug, FromRow)]
pub(super) struct ExecutionRow {
    pub(super) id: Uuid,
    pub(super) definition_logical_name: String,
    pub(super) action_kind: String,
    pub(super) fingerprint: String,
    pub(super) trigger_origin: String,
    pub(super) trigger_instance_key: String,
    pub(super) trigger_payload: Value,
    pub(super) initiated_by: String,
    pub(super) dry_run: bool,
    pub(super) state: String,
    pub(super) action_config: Value,
    pub(super) blocked_reason: Option<String>,
    pub(super) result: Option<Value>,
    pub(super) failure_reason: Option<String>,
    pub(super) cancellation: Option<Value>,
    pub(super) rollback_id: Option<Uuid>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) safety_evaluated_at: Option<DateTime<Utc>>,
    pub(super) execution_started_at: Option<DateTime<Utc>>,
    pub(super) finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(super) struct ApprovalRow {
    pub(super) id: Uuid,
    pub(super) execution_id: Uuid,
    pub(super) eligible_roles: Value,
    pub(super) assigned_to: Option<String>,
    pub(super) decision: String,
    pub(super) decided_by: Option<String>,
    pub(super) decision_reason: Option<String>,
    pub(super) modifications: Option<Value>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(super) struct RollbackRow {
    pub(super) id: Uuid,
    pub(super) execution_id: Uuid,
    pub(super) requested_by: String,
    pub(super) reason: String,
    pub(super) eligibility_note: String,
    pub(super) status: String,
    pub(super) decided_by: Option<String>,
    pub(super) decision_reason: Option<String>,
    pub(super) inverse_result: Option<Value>,
    pub(super) failure_reason: Option<String>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(super) struct StatsRow {
    pub(super) total: i64,
    pub(super) pending_approval: i64,
    pub(super) executing: i64,
    pub(super) completed: i64,
    pub(super) failed: i64,
    pub(super) rejected_unsafe: i64,
    pub(super) cancelled: i64,
    pub(super) rolled_back: i64,
    pub(super) dry_runs: i64,
}

pub(super) fn parse_uuid(value: &str, label: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|error| AppError::Validation(format!("invalid {label} '{value}': {error}")))
}

pub(super) fn definition_from_row(row: DefinitionRow) -> AppResult<ActionDefinition> {
    let trigger: ActionTrigger = serde_json::from_value(row.trigger).map_err(|error| {
        AppError::Internal(format!(
            "stored trigger for definition '{}' is not decodable: {error}",
            row.logical_name
        ))
    })?;
    let approver_roles: Vec<String> =
        serde_json::from_value(row.approver_roles).map_err(|error| {
            AppError::Internal(format!(
                "stored approver roles for definition '{}' are not decodable: {error}",
                row.logical_name
            ))
        })?;

    ActionDefinition::new(ActionDefinitionInput {
        logical_name: row.logical_name,
        display_name: row.display_name,
        description: row.description,
        trigger,
        action_kind: ActionKind::parse(row.action_kind.as_str())?,
        action_config: row.action_config,
        requires_approval: row.requires_approval,
        approver_roles,
        is_active: row.is_active,
    })
}

pub(super) fn execution_from_row(row: ExecutionRow) -> AppResult<ActionExecution> {
    let cancellation = row
        .cancellation
        .map(|value| {
            serde_json::from_value::<CancellationRecord>(value).map_err(|error| {
                AppError::Internal(format!(
                    "stored cancellation record for execution '{}' is not decodable: {error}",
                    row.id
                ))
            })
        })
        .transpose()?;

    Ok(ActionExecution {
        execution_id: row.id.to_string(),
        definition_logical_name: row.definition_logical_name,
        action_kind: ActionKind::parse(row.action_kind.as_str())?,
        fingerprint: row.fingerprint,
        trigger_origin: TriggerOrigin::parse(row.trigger_origin.as_str())?,
        trigger_instance_key: row.trigger_instance_key,
        trigger_payload: row.trigger_payload,
        initiated_by: row.initiated_by,
        dry_run: row.dry_run,
        state: ExecutionState::parse(row.state.as_str())?,
        action_config: row.action_config,
        blocked_reason: row.blocked_reason,
        result: row.result,
        failure_reason: row.failure_reason,
        cancellation,
        rollback_id: row.rollback_id.map(|id| id.to_string()),
        created_at: row.created_at,
        safety_evaluated_at: row.safety_evaluated_at,
        execution_started_at: row.execution_started_at,
        finished_at: row.finished_at,
    })
}

pub(super) fn approval_from_row(row: ApprovalRow) -> AppResult<ApprovalRequest> {
    let eligible_roles: Vec<String> =
        serde_json::from_value(row.eligible_roles).map_err(|error| {
            AppError::Internal(format!(
                "stored eligible roles for approval '{}' are not decodable: {error}",
                row.id
            ))
        })?;

    Ok(ApprovalRequest {
        approval_id: row.id.to_string(),
        execution_id: row.execution_id.to_string(),
        eligible_roles,
        assigned_to: row.assigned_to,
        decision: ApprovalDecision::parse(row.decision.as_str())?,
        decided_by: row.decided_by,
        decision_reason: row.decision_reason,
        modifications: row.modifications,
        created_at: row.created_at,
        decided_at: row.decided_at,
    })
}

pub(super) fn rollback_from_row(row: RollbackRow) -> AppResult<RollbackRequest> {
    Ok(RollbackRequest {
        rollback_id: row.id.to_string(),
        execution_id: row.execution_id.to_string(),
        requested_by: row.requested_by,
        reason: row.reason,
        eligibility_note: row.eligibility_note,
        status: RollbackStatus::parse(row.status.as_str())?,
        decided_by: row.decided_by,
        decision_reason: row.decision_reason,
        inverse_result: row.inverse_result,
        failure_reason: row.failure_reason,
        created_at: row.created_at,
        decided_at: row.decided_at,
    })
}

impl From<StatsRow> for ExecutionStats {
    fn from(row: StatsRow) -> Self {
        Self {
            total: row.total,
            pending_approval: row.pending_approval,
            executing: row.executing,
            completed: row.completed,
            failed: row.failed,
            rejected_unsafe: row.rejected_unsafe,
            cancelled: row.cancelled,
            rolled_back: row.rolled_back,
            dry_runs: row.dry_runs,
        }
    }
}
