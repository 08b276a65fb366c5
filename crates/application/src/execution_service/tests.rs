use std::time::Duration;

use serde_json::json;

use remedia_core::{AppError, TenantId};
use remedia_domain::ActionKind;

use crate::remediation_ports::{
    ActionRunMode, DetectedPattern, ExecutionListQuery, ExecutionState, TriggerOrigin,
};
use crate::safety_service::SafetyPolicy;
use crate::test_support::{definition_input, harness, harness_with_policy, submit_input};

#[tokio::test]
async fn submit_completes_when_no_approval_required() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Completed);
    assert!(execution.result.is_some());
    assert!(execution.finished_at.is_some());
    assert_eq!(*harness.runner.run_count.lock().await, 1);
}

#[tokio::test]
async fn submit_rejects_unsafe_definition_without_running() {
    let policy = SafetyPolicy {
        denied_action_kinds: vec![ActionKind::Escalation],
        ..SafetyPolicy::default()
    };
    let harness = harness_with_policy(policy);
    let saved = harness
        .execution_service
        .save_definition(
            &harness.actor,
            definition_input("escalate_overload", ActionKind::Escalation),
        )
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("escalate_overload", "team-7"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::RejectedUnsafe);
    let blocked_reason = execution.blocked_reason.unwrap_or_default();
    assert!(blocked_reason.contains("action_kind_allowed"));
    assert_eq!(*harness.runner.run_count.lock().await, 0);
}

#[tokio::test]
async fn blocked_reason_lists_every_failing_check() {
    let policy = SafetyPolicy {
        denied_action_kinds: vec![ActionKind::Escalation],
        max_targets: 2,
        ..SafetyPolicy::default()
    };
    let harness = harness_with_policy(policy);
    let saved = harness
        .execution_service
        .save_definition(
            &harness.actor,
            definition_input("escalate_overload", ActionKind::Escalation),
        )
        .await;
    assert!(saved.is_ok());

    let mut input = submit_input("escalate_overload", "team-7");
    input.trigger_payload = json!({"targets": ["a", "b", "c", "d"]});

    let execution = harness
        .execution_service
        .submit(&harness.actor, input)
        .await;

    assert!(execution.is_ok());
    let blocked_reason = execution
        .map(|execution| execution.blocked_reason.unwrap_or_default())
        .unwrap_or_default();
    assert!(blocked_reason.contains("action_kind_allowed"));
    assert!(blocked_reason.contains("blast_radius"));
}

#[tokio::test]
async fn submit_parks_approval_required_definition() {
    let harness = harness();
    let mut input = definition_input("escalate_overload", ActionKind::Escalation);
    input.requires_approval = true;
    input.approver_roles = vec!["ops_lead".to_owned()];
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, input)
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("escalate_overload", "team-7"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::PendingApproval);
    assert_eq!(*harness.runner.run_count.lock().await, 0);

    let approval = harness
        .approval_service
        .get_approval_for_execution(&harness.actor, execution.execution_id.as_str())
        .await;
    assert!(approval.is_ok());
    let approval = approval.unwrap_or_else(|_| unreachable!());
    assert_eq!(approval.eligible_roles, vec!["ops_lead".to_owned()]);
}

#[tokio::test]
async fn submit_without_approval_creates_no_approval_request() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;
    assert!(execution.is_ok());

    let approval = harness
        .approval_service
        .get_approval_for_execution(
            &harness.actor,
            execution
                .map(|execution| execution.execution_id)
                .unwrap_or_default()
                .as_str(),
        )
        .await;
    assert!(matches!(approval, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn submit_is_idempotent_while_execution_is_active() {
    let harness = harness();
    let mut input = definition_input("escalate_overload", ActionKind::Escalation);
    input.requires_approval = true;
    input.approver_roles = vec!["ops_lead".to_owned()];
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, input)
        .await;
    assert!(saved.is_ok());

    let first = harness
        .execution_service
        .submit(&harness.actor, submit_input("escalate_overload", "team-7"))
        .await;
    let second = harness
        .execution_service
        .submit(&harness.actor, submit_input("escalate_overload", "team-7"))
        .await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    let first_id = first.map(|execution| execution.execution_id).unwrap_or_default();
    let second_id = second.map(|execution| execution.execution_id).unwrap_or_default();
    assert_eq!(first_id, second_id);
}

#[tokio::test]
async fn concurrent_submissions_converge_on_one_execution() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());
    // Keep the first runner invocation in flight long enough for the second
    // submission to race against a non-terminal execution.
    *harness.runner.run_delay_ms.lock().await = 25;

    let (first, second) = tokio::join!(
        harness
            .execution_service
            .submit(&harness.actor, submit_input("remind_stale", "team-7")),
        harness
            .execution_service
            .submit(&harness.actor, submit_input("remind_stale", "team-7")),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    let first_id = first.map(|execution| execution.execution_id).unwrap_or_default();
    let second_id = second.map(|execution| execution.execution_id).unwrap_or_default();
    assert_eq!(first_id, second_id);
    assert_eq!(*harness.runner.run_count.lock().await, 1);
}

#[tokio::test]
async fn terminal_execution_frees_the_fingerprint() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());

    let first = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;
    let second = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    let first_id = first.map(|execution| execution.execution_id).unwrap_or_default();
    let second_id = second.map(|execution| execution.execution_id).unwrap_or_default();
    assert_ne!(first_id, second_id);
    assert_eq!(*harness.runner.run_count.lock().await, 2);
}

#[tokio::test]
async fn inactive_definition_cannot_spawn_executions() {
    let harness = harness();
    let mut input = definition_input("remind_stale", ActionKind::Reminder);
    input.is_active = false;
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, input)
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;

    assert!(matches!(execution, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn unknown_definition_is_a_not_found_error() {
    let harness = harness();

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("missing", "team-7"))
        .await;

    assert!(matches!(execution, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn dry_run_completes_without_approval_and_simulates() {
    let harness = harness();
    let mut definition = definition_input("escalate_overload", ActionKind::Escalation);
    definition.requires_approval = true;
    definition.approver_roles = vec!["ops_lead".to_owned()];
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition)
        .await;
    assert!(saved.is_ok());

    let mut input = submit_input("escalate_overload", "team-7");
    input.dry_run = true;

    let execution = harness
        .execution_service
        .submit(&harness.actor, input)
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Completed);
    assert!(execution.dry_run);
    assert_eq!(
        *harness.runner.last_run_mode.lock().await,
        Some(ActionRunMode::DryRun)
    );

    let approval = harness
        .approval_service
        .get_approval_for_execution(&harness.actor, execution.execution_id.as_str())
        .await;
    assert!(matches!(approval, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn runner_failure_marks_execution_failed_without_retry() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());
    *harness.runner.run_failures_remaining.lock().await = 1;

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Failed);
    assert_eq!(
        execution.failure_reason.unwrap_or_default(),
        "internal error: simulated action failure"
    );
    assert_eq!(*harness.runner.run_count.lock().await, 1);
}

#[tokio::test]
async fn missing_runner_marks_execution_failed() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("retry_sync", ActionKind::Retry))
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("retry_sync", "job-1"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Failed);
    assert!(
        execution
            .failure_reason
            .unwrap_or_default()
            .contains("runner unavailable")
    );
}

#[tokio::test]
async fn cancel_pending_approval_closes_the_request() {
    let harness = harness();
    let mut input = definition_input("escalate_overload", ActionKind::Escalation);
    input.requires_approval = true;
    input.approver_roles = vec!["ops_lead".to_owned()];
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, input)
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("escalate_overload", "team-7"))
        .await;
    assert!(execution.is_ok());
    let execution_id = execution
        .map(|execution| execution.execution_id)
        .unwrap_or_default();

    let cancelled = harness
        .execution_service
        .cancel(&harness.actor, execution_id.as_str())
        .await;

    assert!(cancelled.is_ok());
    let cancelled = cancelled.unwrap_or_else(|_| unreachable!());
    assert_eq!(cancelled.state, ExecutionState::Cancelled);
    assert!(cancelled.cancellation.is_some_and(|record| record.confirmed));

    let approval = harness
        .approval_service
        .get_approval_for_execution(&harness.actor, execution_id.as_str())
        .await;
    assert!(approval.is_ok());
    let approval = approval.unwrap_or_else(|_| unreachable!());
    assert_eq!(
        approval.decision_reason.unwrap_or_default(),
        "execution cancelled"
    );
}

#[tokio::test]
async fn cancel_while_executing_is_best_effort() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());
    *harness.runner.run_delay_ms.lock().await = 50;

    let service = harness.execution_service.clone();
    let actor = harness.actor.clone();
    let submit_task = tokio::spawn(async move {
        service
            .submit(&actor, submit_input("remind_stale", "team-7"))
            .await
    });

    let mut execution_id = None;
    for _ in 0..50 {
        let executing = harness
            .execution_service
            .list_executions(
                &harness.actor,
                ExecutionListQuery {
                    definition_logical_name: None,
                    state: Some(ExecutionState::Executing),
                    trigger_origin: None,
                    limit: 10,
                    offset: 0,
                },
            )
            .await;
        assert!(executing.is_ok());
        if let Some(execution) = executing.unwrap_or_default().pop() {
            execution_id = Some(execution.execution_id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let execution_id = execution_id.unwrap_or_default();
    assert!(!execution_id.is_empty());

    let cancelled = harness
        .execution_service
        .cancel(&harness.actor, execution_id.as_str())
        .await;
    assert!(cancelled.is_ok());
    let cancelled = cancelled.unwrap_or_else(|_| unreachable!());
    assert_eq!(cancelled.state, ExecutionState::Cancelled);
    // The runner was in flight, so the side effect is not guaranteed stopped.
    assert!(cancelled.cancellation.is_some_and(|record| !record.confirmed));

    // The late runner outcome must not overwrite the cancellation.
    let submitted = submit_task.await;
    assert!(submitted.is_ok_and(|result| result.is_ok()));
    let execution = harness
        .execution_service
        .get_execution(&harness.actor, execution_id.as_str())
        .await;
    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Cancelled);
}

#[tokio::test]
async fn cancel_rejects_terminal_execution() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;
    assert!(execution.is_ok());
    let execution_id = execution
        .map(|execution| execution.execution_id)
        .unwrap_or_default();

    let cancelled = harness
        .execution_service
        .cancel(&harness.actor, execution_id.as_str())
        .await;

    assert!(matches!(cancelled, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn pattern_sweep_submits_matching_definitions_once_per_instance() {
    let harness = harness();
    // Approval-gated so the first submission stays active and the duplicate
    // occurrence collapses onto it instead of starting a fresh execution.
    let mut input = definition_input("remind_stale", ActionKind::Reminder);
    input.requires_approval = true;
    input.approver_roles = vec!["ops_lead".to_owned()];
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, input)
        .await;
    assert!(saved.is_ok());

    let patterns = vec![
        DetectedPattern {
            tenant_id: harness.tenant_id,
            pattern_type: "stale_review".to_owned(),
            instance_key: "team-7".to_owned(),
            payload: json!({"team": 7}),
        },
        // Duplicate occurrence of the same instance collapses by fingerprint.
        DetectedPattern {
            tenant_id: harness.tenant_id,
            pattern_type: "stale_review".to_owned(),
            instance_key: "team-7".to_owned(),
            payload: json!({"team": 7}),
        },
        DetectedPattern {
            tenant_id: harness.tenant_id,
            pattern_type: "unmatched_pattern".to_owned(),
            instance_key: "team-9".to_owned(),
            payload: json!({"team": 9}),
        },
        // Foreign-tenant patterns are skipped.
        DetectedPattern {
            tenant_id: TenantId::new(),
            pattern_type: "stale_review".to_owned(),
            instance_key: "team-8".to_owned(),
            payload: json!({"team": 8}),
        },
    ];

    let executions = harness
        .execution_service
        .execute_actions_for_patterns(&harness.actor, &patterns, false)
        .await;

    assert!(executions.is_ok());
    let executions = executions.unwrap_or_else(|_| unreachable!());
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].execution_id, executions[1].execution_id);
    assert_eq!(executions[0].state, ExecutionState::PendingApproval);
    assert_eq!(*harness.runner.run_count.lock().await, 0);
    assert!(
        executions
            .iter()
            .all(|execution| execution.trigger_origin == TriggerOrigin::Pattern)
    );
}

#[tokio::test]
async fn stats_and_listing_reflect_terminal_states() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());
    let first = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;
    assert!(first.is_ok());

    *harness.runner.run_failures_remaining.lock().await = 1;
    let second = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-8"))
        .await;
    assert!(second.is_ok());

    let stats = harness
        .execution_service
        .execution_stats(&harness.actor)
        .await;
    assert!(stats.is_ok());
    let stats = stats.unwrap_or_else(|_| unreachable!());
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);

    let failed = harness
        .execution_service
        .list_executions(
            &harness.actor,
            ExecutionListQuery {
                definition_logical_name: Some("remind_stale".to_owned()),
                state: Some(ExecutionState::Failed),
                trigger_origin: None,
                limit: 10,
                offset: 0,
            },
        )
        .await;
    assert!(failed.is_ok());
    assert_eq!(failed.map(|executions| executions.len()).unwrap_or_default(), 1);
}

#[tokio::test]
async fn safety_pre_check_creates_no_execution() {
    let policy = SafetyPolicy {
        denied_action_kinds: vec![ActionKind::Escalation],
        ..SafetyPolicy::default()
    };
    let harness = harness_with_policy(policy);
    let saved = harness
        .execution_service
        .save_definition(
            &harness.actor,
            definition_input("escalate_overload", ActionKind::Escalation),
        )
        .await;
    assert!(saved.is_ok());

    let result = harness
        .execution_service
        .evaluate_definition_safety(&harness.actor, "escalate_overload", &json!({}))
        .await;

    assert!(result.is_ok());
    let result = result.unwrap_or_else(|_| unreachable!());
    assert!(!result.passed);

    let stats = harness
        .execution_service
        .execution_stats(&harness.actor)
        .await;
    assert!(stats.is_ok());
    assert_eq!(stats.map(|stats| stats.total).unwrap_or(-1), 0);
}

#[tokio::test]
async fn audit_sink_failure_does_not_abort_transitions() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());
    *harness.audit.fail_appends.lock().await = true;

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;

    assert!(execution.is_ok());
    let execution = execution.unwrap_or_else(|_| unreachable!());
    assert_eq!(execution.state, ExecutionState::Completed);
}

#[tokio::test]
async fn audit_trail_records_submission_and_completion() {
    let harness = harness();
    let saved = harness
        .execution_service
        .save_definition(&harness.actor, definition_input("remind_stale", ActionKind::Reminder))
        .await;
    assert!(saved.is_ok());

    let execution = harness
        .execution_service
        .submit(&harness.actor, submit_input("remind_stale", "team-7"))
        .await;
    assert!(execution.is_ok());

    let events = harness.audit.events.lock().await;
    let actions: Vec<&str> = events.iter().map(|event| event.action.as_str()).collect();
    assert!(actions.contains(&"remediation.definition.saved"));
    assert!(actions.contains(&"remediation.execution.submitted"));
    assert!(actions.contains(&"remediation.execution.completed"));
}
