mod audit;
mod detector;
mod execution;
mod lock;
mod repository;
mod runner;

pub use audit::{AuditEvent, AuditRepository};
pub(crate) use audit::append_best_effort;
pub use detector::{DetectedPattern, PatternDetector};
pub use execution::{
    ActionExecution, ApprovalDecision, ApprovalDecisionUpdate, ApprovalRequest,
    CancellationRecord, CreateApprovalInput, CreateExecutionInput, CreateRollbackInput,
    ExecutionListQuery, ExecutionState, ExecutionStats, ExecutionTransition, RollbackRequest,
    RollbackResolution, RollbackStatus, SubmitExecutionInput, TriggerOrigin,
};
pub use lock::{FingerprintLease, FingerprintLockCoordinator};
pub use repository::RemediationRepository;
pub use runner::{
    ActionReverseRequest, ActionRunMode, ActionRunRequest, ActionRunner, ActionRunnerRegistry,
};
