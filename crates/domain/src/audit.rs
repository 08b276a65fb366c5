/// Stable audit action identifiers emitted on lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Emitted when an action definition is created or updated.
    ActionDefinitionSaved,
    /// Emitted when a new execution is accepted for a trigger instance.
    ExecutionSubmitted,
    /// Emitted when safety checks block an execution.
    ExecutionRejectedUnsafe,
    /// Emitted when an execution parks awaiting human approval.
    ExecutionAwaitingApproval,
    /// Emitted when an execution finishes successfully.
    ExecutionCompleted,
    /// Emitted when an execution finishes with a failure.
    ExecutionFailed,
    /// Emitted when an execution is cancelled.
    ExecutionCancelled,
    /// Emitted when an approval request is assigned to a decider.
    ApprovalAssigned,
    /// Emitted when an approval request receives its terminal decision.
    ApprovalDecided,
    /// Emitted when a rollback request is opened.
    RollbackRequested,
    /// Emitted when a rollback request is approved or rejected.
    RollbackDecided,
    /// Emitted when the inverse operation of a rollback fails.
    RollbackFailed,
    /// Emitted when an execution is rolled back.
    ExecutionRolledBack,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionDefinitionSaved => "remediation.definition.saved",
            Self::ExecutionSubmitted => "remediation.execution.submitted",
            Self::ExecutionRejectedUnsafe => "remediation.execution.rejected_unsafe",
            Self::ExecutionAwaitingApproval => "remediation.execution.awaiting_approval",
            Self::ExecutionCompleted => "remediation.execution.completed",
            Self::ExecutionFailed => "remediation.execution.failed",
            Self::ExecutionCancelled => "remediation.execution.cancelled",
            Self::ApprovalAssigned => "remediation.approval.assigned",
            Self::ApprovalDecided => "remediation.approval.decided",
            Self::RollbackRequested => "remediation.rollback.requested",
            Self::RollbackDecided => "remediation.rollback.decided",
            Self::RollbackFailed => "remediation.rollback.failed",
            Self::ExecutionRolledBack => "remediation.execution.rolled_back",
        }
    }
}
