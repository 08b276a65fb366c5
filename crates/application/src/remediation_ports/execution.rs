use chrono::{DateTime, Utc};
use remedia_core::{AppError, AppResult};
use remedia_domain::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of one action execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Accepted for a trigger instance, not yet evaluated.
    Created,
    /// Safety checks are being evaluated.
    SafetyCheck,
    /// Safety checks blocked the execution.
    RejectedUnsafe,
    /// Parked awaiting a human approval decision.
    PendingApproval,
    /// The action runner has been dispatched.
    Executing,
    /// The runner finished successfully.
    Completed,
    /// The runner failed or the approval was rejected.
    Failed,
    /// Cancelled before or during dispatch.
    Cancelled,
    /// A completed execution whose inverse operation has run.
    RolledBack,
}

impl ExecutionState {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SafetyCheck => "safety_check",
            Self::RejectedUnsafe => "rejected_unsafe",
            Self::PendingApproval => "pending_approval",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "created" => Ok(Self::Created),
            "safety_check" => Ok(Self::SafetyCheck),
            "rejected_unsafe" => Ok(Self::RejectedUnsafe),
            "pending_approval" => Ok(Self::PendingApproval),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "rolled_back" => Ok(Self::RolledBack),
            _ => Err(AppError::Validation(format!(
                "unknown execution state '{value}'"
            ))),
        }
    }

    /// Returns whether no further forward transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RejectedUnsafe | Self::Completed | Self::Failed | Self::Cancelled | Self::RolledBack
        )
    }

    /// Returns whether `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        match self {
            Self::Created => matches!(next, Self::SafetyCheck),
            Self::SafetyCheck => matches!(
                next,
                Self::RejectedUnsafe | Self::PendingApproval | Self::Executing
            ),
            // RejectedUnsafe covers the pre-dispatch safety re-check after an
            // approval: a definition can become newly unsafe while waiting.
            Self::PendingApproval => matches!(
                next,
                Self::Executing | Self::RejectedUnsafe | Self::Failed | Self::Cancelled
            ),
            Self::Executing => matches!(next, Self::Completed | Self::Failed | Self::Cancelled),
            Self::Completed => matches!(next, Self::RolledBack),
            Self::RejectedUnsafe | Self::Failed | Self::Cancelled | Self::RolledBack => false,
        }
    }
}

/// Origin of the trigger that spawned an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// Manually invoked by an operator.
    Manual,
    /// Emitted by the pattern detection sweep.
    Pattern,
    /// Emitted by a schedule evaluation.
    Schedule,
}

impl TriggerOrigin {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Pattern => "pattern",
            Self::Schedule => "schedule",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "manual" => Ok(Self::Manual),
            "pattern" => Ok(Self::Pattern),
            "schedule" => Ok(Self::Schedule),
            _ => Err(AppError::Validation(format!(
                "unknown trigger origin '{value}'"
            ))),
        }
    }
}

/// Cancellation bookkeeping attached to a cancelled execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    /// Subject that requested cancellation.
    pub requested_by: String,
    /// Cancellation request timestamp.
    pub requested_at: DateTime<Utc>,
    /// Whether the engine can guarantee the action side effect never ran.
    ///
    /// False when the runner was already in flight; the ambiguity is
    /// surfaced to callers, never hidden.
    pub confirmed: bool,
}

/// One attempt to run an action definition for a specific trigger instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionExecution {
    /// Stable execution identifier.
    pub execution_id: String,
    /// Logical name of the definition this execution references.
    pub definition_logical_name: String,
    /// Action category snapshot used for runner dispatch.
    pub action_kind: ActionKind,
    /// Deduplication fingerprint.
    pub fingerprint: String,
    /// Origin of the trigger recorded at submission.
    pub trigger_origin: TriggerOrigin,
    /// Trigger instance key that scoped the fingerprint.
    pub trigger_instance_key: String,
    /// Trigger payload captured for diagnostics and runners.
    pub trigger_payload: Value,
    /// Subject that initiated the submission.
    pub initiated_by: String,
    /// Whether the runner was told to simulate.
    pub dry_run: bool,
    /// Current lifecycle state.
    pub state: ExecutionState,
    /// Action configuration used at dispatch, including approval overrides.
    pub action_config: Value,
    /// Safety blocked reason when rejected unsafe.
    pub blocked_reason: Option<String>,
    /// Runner result payload when completed.
    pub result: Option<Value>,
    /// Failure reason when failed.
    pub failure_reason: Option<String>,
    /// Cancellation record when cancelled.
    pub cancellation: Option<CancellationRecord>,
    /// Rollback request linked once the execution is rolled back.
    pub rollback_id: Option<String>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Safety evaluation timestamp.
    pub safety_evaluated_at: Option<DateTime<Utc>>,
    /// Runner dispatch timestamp.
    pub execution_started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Submission payload accepted by the execution service.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitExecutionInput {
    /// Logical name of the definition to execute.
    pub definition_logical_name: String,
    /// Origin of the trigger.
    pub trigger_origin: TriggerOrigin,
    /// Stable key identifying the trigger occurrence for deduplication.
    pub trigger_instance_key: String,
    /// Trigger payload handed to safety checks and the runner.
    pub trigger_payload: Value,
    /// Whether the runner must simulate instead of acting.
    pub dry_run: bool,
}

/// Internal execution creation payload for repository implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateExecutionInput {
    /// Definition logical name.
    pub definition_logical_name: String,
    /// Action category snapshot.
    pub action_kind: ActionKind,
    /// Deduplication fingerprint.
    pub fingerprint: String,
    /// Trigger origin.
    pub trigger_origin: TriggerOrigin,
    /// Trigger instance key.
    pub trigger_instance_key: String,
    /// Trigger payload.
    pub trigger_payload: Value,
    /// Initiating subject.
    pub initiated_by: String,
    /// Dry-run flag.
    pub dry_run: bool,
    /// Action configuration snapshot from the definition.
    pub action_config: Value,
}

/// Guarded state transition applied to one execution.
///
/// The repository applies the update only while the stored state equals
/// `expected_state`, which keeps per-execution transitions strictly ordered
/// even across processes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTransition {
    /// Execution identifier.
    pub execution_id: String,
    /// State the execution must currently hold for the update to apply.
    pub expected_state: ExecutionState,
    /// State the execution moves to.
    pub next_state: ExecutionState,
    /// Safety blocked reason to record, when rejecting.
    pub blocked_reason: Option<String>,
    /// Runner result payload to record, when completing.
    pub result: Option<Value>,
    /// Failure reason to record, when failing.
    pub failure_reason: Option<String>,
    /// Replacement action configuration, when an approval carried overrides.
    pub action_config: Option<Value>,
    /// Cancellation record, when cancelling.
    pub cancellation: Option<CancellationRecord>,
    /// Rollback linkage, when rolling back.
    pub rollback_id: Option<String>,
}

impl ExecutionTransition {
    /// Creates a bare transition between two states.
    #[must_use]
    pub fn new(
        execution_id: impl Into<String>,
        expected_state: ExecutionState,
        next_state: ExecutionState,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            expected_state,
            next_state,
            blocked_reason: None,
            result: None,
            failure_reason: None,
            action_config: None,
            cancellation: None,
            rollback_id: None,
        }
    }
}

/// Approval decision lifecycle values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Awaiting a decision.
    Pending,
    /// Execution may proceed.
    Approved,
    /// Execution may not proceed.
    Rejected,
}

impl ApprovalDecision {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(AppError::Validation(format!(
                "unknown approval decision '{value}'"
            ))),
        }
    }
}

/// Human approval request gating one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    /// Stable approval request identifier.
    pub approval_id: String,
    /// Execution the request gates (one-to-one).
    pub execution_id: String,
    /// Role set copied from the definition when the request was created.
    ///
    /// Later definition edits never change in-flight approvals.
    pub eligible_roles: Vec<String>,
    /// Subject currently expected to decide, when assigned.
    pub assigned_to: Option<String>,
    /// Decision state.
    pub decision: ApprovalDecision,
    /// Subject that decided, once decided.
    pub decided_by: Option<String>,
    /// Human-readable decision reason.
    pub decision_reason: Option<String>,
    /// JSON-object overrides applied to the action configuration on approval.
    pub modifications: Option<Value>,
    /// Request creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Decision timestamp, once decided.
    pub decided_at: Option<DateTime<Utc>>,
}

/// Internal approval creation payload for repository implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateApprovalInput {
    /// Execution the request gates.
    pub execution_id: String,
    /// Role snapshot copied from the definition.
    pub eligible_roles: Vec<String>,
}

/// Terminal decision applied to one pending approval request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecisionUpdate {
    /// Approval request identifier.
    pub approval_id: String,
    /// Recorded decision.
    pub decision: ApprovalDecision,
    /// Deciding subject.
    pub decided_by: String,
    /// Optional decision reason.
    pub reason: Option<String>,
    /// Optional JSON-object configuration overrides.
    pub modifications: Option<Value>,
}

/// Rollback request lifecycle values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    /// Awaiting an approve/reject decision.
    Pending,
    /// Rejected without running the inverse operation.
    Rejected,
    /// Approved and the inverse operation succeeded.
    Completed,
    /// Approved but the inverse operation failed.
    Failed,
}

impl RollbackStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown rollback status '{value}'"
            ))),
        }
    }

    /// Returns whether the request still blocks new rollback requests.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Compensating-action request raised against a completed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackRequest {
    /// Stable rollback request identifier.
    pub rollback_id: String,
    /// Execution the request targets.
    pub execution_id: String,
    /// Requesting subject.
    pub requested_by: String,
    /// Why the rollback was requested.
    pub reason: String,
    /// Eligibility note captured when the request was accepted.
    pub eligibility_note: String,
    /// Request lifecycle status.
    pub status: RollbackStatus,
    /// Deciding subject, once decided.
    pub decided_by: Option<String>,
    /// Human-readable decision reason.
    pub decision_reason: Option<String>,
    /// Inverse-operation result payload when completed.
    pub inverse_result: Option<Value>,
    /// Inverse-operation failure detail when failed.
    pub failure_reason: Option<String>,
    /// Request creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Decision timestamp, once decided.
    pub decided_at: Option<DateTime<Utc>>,
}

/// Internal rollback creation payload for repository implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRollbackInput {
    /// Execution the request targets.
    pub execution_id: String,
    /// Requesting subject.
    pub requested_by: String,
    /// Why the rollback is requested.
    pub reason: String,
    /// Eligibility note captured at request time.
    pub eligibility_note: String,
}

/// Terminal resolution applied to one pending rollback request.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackResolution {
    /// Rollback request identifier.
    pub rollback_id: String,
    /// Terminal status.
    pub status: RollbackStatus,
    /// Deciding subject.
    pub decided_by: String,
    /// Optional decision reason.
    pub decision_reason: Option<String>,
    /// Inverse-operation result when completed.
    pub inverse_result: Option<Value>,
    /// Inverse-operation failure detail when failed.
    pub failure_reason: Option<String>,
}

/// Execution listing filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionListQuery {
    /// Optional definition logical name filter.
    pub definition_logical_name: Option<String>,
    /// Optional state filter.
    pub state: Option<ExecutionState>,
    /// Optional trigger origin filter.
    pub trigger_origin: Option<TriggerOrigin>,
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

/// Aggregate execution counts for operations visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionStats {
    /// Executions ever submitted.
    pub total: i64,
    /// Executions awaiting approval.
    pub pending_approval: i64,
    /// Executions currently dispatched.
    pub executing: i64,
    /// Executions completed successfully.
    pub completed: i64,
    /// Executions that failed.
    pub failed: i64,
    /// Executions blocked by safety checks.
    pub rejected_unsafe: i64,
    /// Executions cancelled.
    pub cancelled: i64,
    /// Executions rolled back.
    pub rolled_back: i64,
    /// Executions that ran in dry-run mode.
    pub dry_runs: i64,
}
