//! Application services and ports for the remediation workflow.

#![forbid(unsafe_code)]

mod approval_service;
mod execution_service;
mod remediation_ports;
mod rollback_service;
mod safety_service;

#[cfg(test)]
mod test_support;

pub use approval_service::{ApprovalDecisionInput, ApprovalService};
pub use execution_service::ExecutionService;
pub use remediation_ports::{
    ActionExecution, ActionReverseRequest, ActionRunMode, ActionRunRequest, ActionRunner,
    ActionRunnerRegistry, ApprovalDecision, ApprovalDecisionUpdate, ApprovalRequest, AuditEvent,
    AuditRepository, CancellationRecord, CreateApprovalInput, CreateExecutionInput,
    CreateRollbackInput, DetectedPattern, ExecutionListQuery, ExecutionState, ExecutionStats,
    ExecutionTransition, FingerprintLease, FingerprintLockCoordinator, PatternDetector,
    RemediationRepository, RollbackRequest, RollbackResolution, RollbackStatus,
    SubmitExecutionInput, TriggerOrigin,
};
pub use rollback_service::{RollbackEligibility, RollbackService};
pub use safety_service::{
    ExecutionUsageSource, SafetyCheck, SafetyCheckResult, SafetyContext, SafetyPolicy,
    SafetyValidator,
};
