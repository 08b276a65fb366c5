use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use remedia_core::{ActorIdentity, AppError, AppResult, TenantId};
use remedia_domain::{ActionDefinition, ActionDefinitionInput, ActionKind, ActionTrigger};

use crate::approval_service::ApprovalService;
use crate::execution_service::ExecutionService;
use crate::remediation_ports::{
    ActionExecution, ActionReverseRequest, ActionRunMode, ActionRunRequest, ActionRunner,
    ActionRunnerRegistry, ApprovalDecision, ApprovalDecisionUpdate, ApprovalRequest, AuditEvent,
    AuditRepository, CreateApprovalInput, CreateExecutionInput, CreateRollbackInput,
    ExecutionListQuery, ExecutionState, ExecutionStats, ExecutionTransition, FingerprintLease,
    FingerprintLockCoordinator, RemediationRepository, RollbackRequest, RollbackResolution,
    RollbackStatus, SubmitExecutionInput, TriggerOrigin,
};
use crate::rollback_service::RollbackService;
use crate::safety_service::{ExecutionUsageSource, SafetyPolicy, SafetyValidator};

#[derive(Default)]
pub(crate) struct FakeRemediationRepository {
    definitions: Mutex<HashMap<(TenantId, String), ActionDefinition>>,
    executions: Mutex<Vec<ActionExecution>>,
    approvals: Mutex<Vec<ApprovalRequest>>,
    rollbacks: Mutex<Vec<RollbackRequest>>,
}

#[async_trait]
impl RemediationRepository for FakeRemediationRepository {
    async fn save_definition(
        &self,
        tenant_id: TenantId,
        definition: ActionDefinition,
    ) -> AppResult<()> {
        self.definitions.lock().await.insert(
            (tenant_id, definition.logical_name().as_str().to_owned()),
            definition,
        );
        Ok(())
    }

    async fn list_definitions(&self, tenant_id: TenantId) -> AppResult<Vec<ActionDefinition>> {
        Ok(self
            .definitions
            .lock()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .map(|(_, definition)| definition.clone())
            .collect())
    }

    async fn find_definition(
        &self,
        tenant_id: TenantId,
        logical_name: &str,
    ) -> AppResult<Option<ActionDefinition>> {
        Ok(self
            .definitions
            .lock()
            .await
            .get(&(tenant_id, logical_name.to_owned()))
            .cloned())
    }

    async fn list_active_definitions_for_pattern(
        &self,
        tenant_id: TenantId,
        pattern_type: &str,
    ) -> AppResult<Vec<ActionDefinition>> {
        Ok(self
            .definitions
            .lock()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), definition)| {
                *stored_tenant_id == tenant_id
                    && definition.is_active()
                    && definition.trigger().pattern_type() == Some(pattern_type)
            })
            .map(|(_, definition)| definition.clone())
            .collect())
    }

    async fn create_execution(
        &self,
        tenant_id: TenantId,
        input: CreateExecutionInput,
    ) -> AppResult<ActionExecution> {
        let mut executions = self.executions.lock().await;

        if executions
            .iter()
            .any(|execution| execution.fingerprint == input.fingerprint && !execution.state.is_terminal())
        {
            return Err(AppError::Conflict(format!(
                "an active execution already holds fingerprint '{}' for tenant '{tenant_id}'",
                input.fingerprint
            )));
        }

        let execution = ActionExecution {
            execution_id: format!("execution-{}", executions.len() + 1),
            definition_logical_name: input.definition_logical_name,
            action_kind: input.action_kind,
            fingerprint: input.fingerprint,
            trigger_origin: input.trigger_origin,
            trigger_instance_key: input.trigger_instance_key,
            trigger_payload: input.trigger_payload,
            initiated_by: input.initiated_by,
            dry_run: input.dry_run,
            state: ExecutionState::Created,
            action_config: input.action_config,
            blocked_reason: None,
            result: None,
            failure_reason: None,
            cancellation: None,
            rollback_id: None,
            created_at: Utc::now(),
            safety_evaluated_at: None,
            execution_started_at: None,
            finished_at: None,
        };

        executions.push(execution.clone());
        Ok(execution)
    }

    async fn find_execution(
        &self,
        _tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ActionExecution>> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .find(|execution| execution.execution_id == execution_id)
            .cloned())
    }

    async fn find_active_execution_by_fingerprint(
        &self,
        _tenant_id: TenantId,
        fingerprint: &str,
    ) -> AppResult<Option<ActionExecution>> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .find(|execution| {
                execution.fingerprint == fingerprint && !execution.state.is_terminal()
            })
            .cloned())
    }

    async fn transition_execution(
        &self,
        _tenant_id: TenantId,
        transition: ExecutionTransition,
    ) -> AppResult<ActionExecution> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .iter_mut()
            .find(|execution| execution.execution_id == transition.execution_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "execution '{}' does not exist",
                    transition.execution_id
                ))
            })?;

        if execution.state != transition.expected_state {
            return Err(AppError::InvalidTransition(format!(
                "execution '{}' is '{}', expected '{}'",
                execution.execution_id,
                execution.state.as_str(),
                transition.expected_state.as_str()
            )));
        }

        if !transition.expected_state.can_transition_to(transition.next_state) {
            return Err(AppError::InvalidTransition(format!(
                "execution '{}' cannot move from '{}' to '{}'",
                execution.execution_id,
                transition.expected_state.as_str(),
                transition.next_state.as_str()
            )));
        }

        execution.state = transition.next_state;
        if let Some(blocked_reason) = transition.blocked_reason {
            execution.blocked_reason = Some(blocked_reason);
        }
        if let Some(result) = transition.result {
            execution.result = Some(result);
        }
        if let Some(failure_reason) = transition.failure_reason {
            execution.failure_reason = Some(failure_reason);
        }
        if let Some(action_config) = transition.action_config {
            execution.action_config = action_config;
        }
        if let Some(cancellation) = transition.cancellation {
            execution.cancellation = Some(cancellation);
        }
        if let Some(rollback_id) = transition.rollback_id {
            execution.rollback_id = Some(rollback_id);
        }

        let now = Utc::now();
        if transition.expected_state == ExecutionState::SafetyCheck {
            execution.safety_evaluated_at = Some(now);
        }
        if transition.next_state == ExecutionState::Executing {
            execution.execution_started_at = Some(now);
        }
        if transition.next_state.is_terminal() {
            execution.finished_at = Some(now);
        }

        Ok(execution.clone())
    }

    async fn list_executions(
        &self,
        _tenant_id: TenantId,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .filter(|execution| {
                query
                    .definition_logical_name
                    .as_deref()
                    .is_none_or(|name| execution.definition_logical_name == name)
                    && query.state.is_none_or(|state| execution.state == state)
                    && query
                        .trigger_origin
                        .is_none_or(|origin| execution.trigger_origin == origin)
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn execution_stats(&self, _tenant_id: TenantId) -> AppResult<ExecutionStats> {
        let executions = self.executions.lock().await;
        let mut stats = ExecutionStats::default();

        for execution in executions.iter() {
            stats.total += 1;
            if execution.dry_run {
                stats.dry_runs += 1;
            }
            match execution.state {
                ExecutionState::PendingApproval => stats.pending_approval += 1,
                ExecutionState::Executing => stats.executing += 1,
                ExecutionState::Completed => stats.completed += 1,
                ExecutionState::Failed => stats.failed += 1,
                ExecutionState::RejectedUnsafe => stats.rejected_unsafe += 1,
                ExecutionState::Cancelled => stats.cancelled += 1,
                ExecutionState::RolledBack => stats.rolled_back += 1,
                ExecutionState::Created | ExecutionState::SafetyCheck => {}
            }
        }

        Ok(stats)
    }

    async fn create_approval(
        &self,
        _tenant_id: TenantId,
        input: CreateApprovalInput,
    ) -> AppResult<ApprovalRequest> {
        let mut approvals = self.approvals.lock().await;
        let approval = ApprovalRequest {
            approval_id: format!("approval-{}", approvals.len() + 1),
            execution_id: input.execution_id,
            eligible_roles: input.eligible_roles,
            assigned_to: None,
            decision: ApprovalDecision::Pending,
            decided_by: None,
            decision_reason: None,
            modifications: None,
            created_at: Utc::now(),
            decided_at: None,
        };

        approvals.push(approval.clone());
        Ok(approval)
    }

    async fn find_approval(
        &self,
        _tenant_id: TenantId,
        approval_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        Ok(self
            .approvals
            .lock()
            .await
            .iter()
            .find(|approval| approval.approval_id == approval_id)
            .cloned())
    }

    async fn find_approval_for_execution(
        &self,
        _tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<ApprovalRequest>> {
        Ok(self
            .approvals
            .lock()
            .await
            .iter()
            .find(|approval| approval.execution_id == execution_id)
            .cloned())
    }

    async fn assign_approval(
        &self,
        _tenant_id: TenantId,
        approval_id: &str,
        assignee: &str,
    ) -> AppResult<ApprovalRequest> {
        let mut approvals = self.approvals.lock().await;
        let approval = approvals
            .iter_mut()
            .find(|approval| approval.approval_id == approval_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("approval request '{approval_id}' does not exist"))
            })?;

        if approval.decision != ApprovalDecision::Pending {
            return Err(AppError::InvalidTransition(format!(
                "approval request '{approval_id}' is already decided"
            )));
        }

        approval.assigned_to = Some(assignee.to_owned());
        Ok(approval.clone())
    }

    async fn decide_approval(
        &self,
        _tenant_id: TenantId,
        update: ApprovalDecisionUpdate,
    ) -> AppResult<ApprovalRequest> {
        let mut approvals = self.approvals.lock().await;
        let approval = approvals
            .iter_mut()
            .find(|approval| approval.approval_id == update.approval_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "approval request '{}' does not exist",
                    update.approval_id
                ))
            })?;

        if approval.decision != ApprovalDecision::Pending {
            return Err(AppError::InvalidTransition(format!(
                "approval request '{}' is already decided",
                update.approval_id
            )));
        }

        approval.decision = update.decision;
        approval.decided_by = Some(update.decided_by);
        approval.decision_reason = update.reason;
        approval.modifications = update.modifications;
        approval.decided_at = Some(Utc::now());
        Ok(approval.clone())
    }

    async fn create_rollback(
        &self,
        _tenant_id: TenantId,
        input: CreateRollbackInput,
    ) -> AppResult<RollbackRequest> {
        let mut rollbacks = self.rollbacks.lock().await;

        if rollbacks
            .iter()
            .any(|rollback| rollback.execution_id == input.execution_id && rollback.status.is_active())
        {
            return Err(AppError::Conflict(format!(
                "execution '{}' already has an active rollback request",
                input.execution_id
            )));
        }

        let rollback = RollbackRequest {
            rollback_id: format!("rollback-{}", rollbacks.len() + 1),
            execution_id: input.execution_id,
            requested_by: input.requested_by,
            reason: input.reason,
            eligibility_note: input.eligibility_note,
            status: RollbackStatus::Pending,
            decided_by: None,
            decision_reason: None,
            inverse_result: None,
            failure_reason: None,
            created_at: Utc::now(),
            decided_at: None,
        };

        rollbacks.push(rollback.clone());
        Ok(rollback)
    }

    async fn find_rollback(
        &self,
        _tenant_id: TenantId,
        rollback_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        Ok(self
            .rollbacks
            .lock()
            .await
            .iter()
            .find(|rollback| rollback.rollback_id == rollback_id)
            .cloned())
    }

    async fn find_active_rollback_for_execution(
        &self,
        _tenant_id: TenantId,
        execution_id: &str,
    ) -> AppResult<Option<RollbackRequest>> {
        Ok(self
            .rollbacks
            .lock()
            .await
            .iter()
            .find(|rollback| rollback.execution_id == execution_id && rollback.status.is_active())
            .cloned())
    }

    async fn resolve_rollback(
        &self,
        _tenant_id: TenantId,
        resolution: RollbackResolution,
    ) -> AppResult<RollbackRequest> {
        let mut rollbacks = self.rollbacks.lock().await;
        let rollback = rollbacks
            .iter_mut()
            .find(|rollback| rollback.rollback_id == resolution.rollback_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "rollback request '{}' does not exist",
                    resolution.rollback_id
                ))
            })?;

        if rollback.status != RollbackStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "rollback request '{}' is already '{}'",
                resolution.rollback_id,
                rollback.status.as_str()
            )));
        }

        rollback.status = resolution.status;
        rollback.decided_by = Some(resolution.decided_by);
        rollback.decision_reason = resolution.decision_reason;
        rollback.inverse_result = resolution.inverse_result;
        rollback.failure_reason = resolution.failure_reason;
        rollback.decided_at = Some(Utc::now());
        Ok(rollback.clone())
    }
}

#[async_trait]
impl ExecutionUsageSource for FakeRemediationRepository {
    async fn count_executions_started_since(
        &self,
        _tenant_id: TenantId,
        definition_logical_name: &str,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .filter(|execution| {
                execution.definition_logical_name == definition_logical_name
                    && execution
                        .execution_started_at
                        .is_some_and(|started_at| started_at >= since)
            })
            .count()
            .try_into()
            .unwrap_or(i64::MAX))
    }
}

#[derive(Default)]
pub(crate) struct FakeFingerprintLock {
    held: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl FingerprintLockCoordinator for FakeFingerprintLock {
    async fn try_acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<FingerprintLease>> {
        let mut held = self.held.lock().await;
        if held.contains_key(scope_key) {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", held.len() + 1);
        held.insert(scope_key.to_owned(), token.clone());

        Ok(Some(FingerprintLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release(&self, lease: &FingerprintLease) -> AppResult<()> {
        let mut held = self.held.lock().await;
        if held.get(&lease.scope_key) == Some(&lease.token) {
            held.remove(&lease.scope_key);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail_appends: Mutex<bool>,
}

#[async_trait]
impl AuditRepository for RecordingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if *self.fail_appends.lock().await {
            return Err(AppError::Internal("audit sink unavailable".to_owned()));
        }

        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct FakeActionRunner {
    pub(crate) reversible: bool,
    pub(crate) run_count: Mutex<u32>,
    pub(crate) reverse_count: Mutex<u32>,
    pub(crate) run_failures_remaining: Mutex<u32>,
    pub(crate) reverse_failures_remaining: Mutex<u32>,
    pub(crate) run_delay_ms: Mutex<u64>,
    pub(crate) last_run_config: Mutex<Option<Value>>,
    pub(crate) last_run_mode: Mutex<Option<ActionRunMode>>,
}

impl FakeActionRunner {
    pub(crate) fn new(reversible: bool) -> Self {
        Self {
            reversible,
            run_count: Mutex::new(0),
            reverse_count: Mutex::new(0),
            run_failures_remaining: Mutex::new(0),
            reverse_failures_remaining: Mutex::new(0),
            run_delay_ms: Mutex::new(0),
            last_run_config: Mutex::new(None),
            last_run_mode: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ActionRunner for FakeActionRunner {
    async fn run(&self, request: ActionRunRequest) -> AppResult<Value> {
        *self.run_count.lock().await += 1;
        *self.last_run_config.lock().await = Some(request.config.clone());
        *self.last_run_mode.lock().await = Some(request.mode);

        let delay_ms = *self.run_delay_ms.lock().await;
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        let mut failures = self.run_failures_remaining.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(AppError::Internal("simulated action failure".to_owned()));
        }

        Ok(json!({
            "delivered": request.mode == ActionRunMode::Live,
            "simulated": request.mode == ActionRunMode::DryRun,
            "execution_id": request.execution_id,
        }))
    }

    fn supports_reverse(&self) -> bool {
        self.reversible
    }

    async fn reverse(&self, request: ActionReverseRequest) -> AppResult<Value> {
        *self.reverse_count.lock().await += 1;

        let mut failures = self.reverse_failures_remaining.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(AppError::Internal(
                "simulated inverse operation failure".to_owned(),
            ));
        }

        Ok(json!({"reversed": true, "execution_id": request.execution_id}))
    }
}

pub(crate) struct TestHarness {
    pub(crate) tenant_id: TenantId,
    pub(crate) actor: ActorIdentity,
    pub(crate) repository: Arc<FakeRemediationRepository>,
    pub(crate) runner: Arc<FakeActionRunner>,
    pub(crate) reversible_runner: Arc<FakeActionRunner>,
    pub(crate) audit: Arc<RecordingAuditRepository>,
    pub(crate) execution_service: ExecutionService,
    pub(crate) approval_service: ApprovalService,
    pub(crate) rollback_service: RollbackService,
}

pub(crate) fn harness() -> TestHarness {
    harness_with_policy(SafetyPolicy::default())
}

pub(crate) fn harness_with_policy(policy: SafetyPolicy) -> TestHarness {
    let tenant_id = TenantId::new();
    let actor = ActorIdentity::new("ops-bot", "Ops Bot", tenant_id);
    let repository = Arc::new(FakeRemediationRepository::default());
    let audit = Arc::new(RecordingAuditRepository::default());
    let runner = Arc::new(FakeActionRunner::new(false));
    let reversible_runner = Arc::new(FakeActionRunner::new(true));

    // Retry stays unregistered so tests can exercise the missing-runner path.
    let registry = Arc::new(
        ActionRunnerRegistry::new()
            .with_runner(ActionKind::Reminder, runner.clone())
            .with_runner(ActionKind::Notify, runner.clone())
            .with_runner(ActionKind::Escalation, runner.clone())
            .with_runner(ActionKind::Redistribute, reversible_runner.clone()),
    );

    let safety_validator = SafetyValidator::new(repository.clone(), policy);
    let execution_service = ExecutionService::new(
        repository.clone(),
        safety_validator,
        registry.clone(),
        Arc::new(FakeFingerprintLock::default()),
        audit.clone(),
    )
    .with_lock_retry(5, 1);

    let approval_service = ApprovalService::new(
        repository.clone(),
        execution_service.clone(),
        audit.clone(),
    );
    let rollback_service = RollbackService::new(repository.clone(), registry, audit.clone());

    TestHarness {
        tenant_id,
        actor,
        repository,
        runner,
        reversible_runner,
        audit,
        execution_service,
        approval_service,
        rollback_service,
    }
}

pub(crate) fn definition_input(logical_name: &str, kind: ActionKind) -> ActionDefinitionInput {
    ActionDefinitionInput {
        logical_name: logical_name.to_owned(),
        display_name: logical_name.replace('_', " "),
        description: None,
        trigger: ActionTrigger::Pattern {
            pattern_type: "stale_review".to_owned(),
            config: json!({}),
        },
        action_kind: kind,
        action_config: json!({"endpoint": "https://hooks.example.test/actions", "channel": "ops"}),
        requires_approval: false,
        approver_roles: Vec::new(),
        is_active: true,
    }
}

pub(crate) fn submit_input(definition_logical_name: &str, instance_key: &str) -> SubmitExecutionInput {
    SubmitExecutionInput {
        definition_logical_name: definition_logical_name.to_owned(),
        trigger_origin: TriggerOrigin::Manual,
        trigger_instance_key: instance_key.to_owned(),
        trigger_payload: json!({"detail": "manual trigger"}),
        dry_run: false,
    }
}
