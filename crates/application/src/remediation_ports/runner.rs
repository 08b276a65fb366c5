use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use remedia_core::{AppError, AppResult, TenantId};
use remedia_domain::ActionKind;
use serde_json::Value;

/// Side-effect mode for one runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRunMode {
    /// Perform the real side effect.
    Live,
    /// Simulate the side effect and report what would have happened.
    DryRun,
}

/// Invocation payload handed to an action runner.
#[derive(Debug, Clone)]
pub struct ActionRunRequest {
    /// Tenant scope for the invocation.
    pub tenant_id: TenantId,
    /// Execution identifier, usable as an idempotency key downstream.
    pub execution_id: String,
    /// Action category being dispatched.
    pub action_kind: ActionKind,
    /// Effective action configuration, including approval overrides.
    pub config: Value,
    /// Trigger payload captured at submission.
    pub trigger_payload: Value,
    /// Side-effect mode.
    pub mode: ActionRunMode,
}

/// Inverse-operation payload handed to a reversible runner.
#[derive(Debug, Clone)]
pub struct ActionReverseRequest {
    /// Tenant scope for the invocation.
    pub tenant_id: TenantId,
    /// Execution being rolled back.
    pub execution_id: String,
    /// Action category being reversed.
    pub action_kind: ActionKind,
    /// Effective action configuration the original run used.
    pub config: Value,
    /// Result payload the original run produced.
    pub original_result: Value,
}

/// Pluggable executor for one action kind.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Performs (or simulates) the action and returns its result payload.
    async fn run(&self, request: ActionRunRequest) -> AppResult<Value>;

    /// Returns whether this runner supports a compensating inverse operation.
    fn supports_reverse(&self) -> bool {
        false
    }

    /// Performs the inverse of a previously completed action.
    async fn reverse(&self, request: ActionReverseRequest) -> AppResult<Value> {
        Err(AppError::Validation(format!(
            "action kind '{}' does not support reverse",
            request.action_kind.as_str()
        )))
    }
}

/// Registry mapping action kinds to runner implementations.
///
/// Adding an action kind means registering a runner, not subclassing.
#[derive(Clone, Default)]
pub struct ActionRunnerRegistry {
    runners: HashMap<ActionKind, Arc<dyn ActionRunner>>,
}

impl ActionRunnerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    /// Registers one runner for an action kind, replacing any prior entry.
    pub fn register(&mut self, kind: ActionKind, runner: Arc<dyn ActionRunner>) {
        self.runners.insert(kind, runner);
    }

    /// Adds one runner registration in builder style.
    #[must_use]
    pub fn with_runner(mut self, kind: ActionKind, runner: Arc<dyn ActionRunner>) -> Self {
        self.register(kind, runner);
        self
    }

    /// Returns the runner registered for an action kind.
    pub fn runner_for(&self, kind: ActionKind) -> AppResult<Arc<dyn ActionRunner>> {
        self.runners.get(&kind).cloned().ok_or_else(|| {
            AppError::NotFound(format!(
                "no action runner registered for kind '{}'",
                kind.as_str()
            ))
        })
    }

    /// Returns whether the runner registered for a kind supports reverse.
    #[must_use]
    pub fn supports_reverse(&self, kind: ActionKind) -> bool {
        self.runners
            .get(&kind)
            .is_some_and(|runner| runner.supports_reverse())
    }
}
