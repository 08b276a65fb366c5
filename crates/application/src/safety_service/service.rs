use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use remedia_core::{AppResult, TenantId};
use remedia_domain::ActionDefinition;
use serde::Serialize;

use super::config::SafetyPolicy;
use super::ports::ExecutionUsageSource;

/// One guardrail evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyCheck {
    /// Stable check name.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Human-readable outcome detail.
    pub detail: String,
}

/// Aggregated guardrail verdict for one proposed execution.
///
/// Every failing check is reported, not just the first, so callers can show
/// complete diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyCheckResult {
    /// Individual checks in evaluation order.
    pub checks: Vec<SafetyCheck>,
    /// Overall verdict.
    pub passed: bool,
    /// Summarizing reason when blocked.
    pub blocked_reason: Option<String>,
}

impl SafetyCheckResult {
    fn from_checks(checks: Vec<SafetyCheck>) -> Self {
        let failing: Vec<&SafetyCheck> = checks.iter().filter(|check| !check.passed).collect();
        let passed = failing.is_empty();
        let blocked_reason = (!passed).then(|| {
            let details = failing
                .iter()
                .map(|check| format!("{}: {}", check.name, check.detail))
                .collect::<Vec<_>>()
                .join("; ");
            format!("blocked by safety checks ({details})")
        });

        Self {
            checks,
            passed,
            blocked_reason,
        }
    }
}

/// Evaluation context resolved by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyContext {
    /// Evaluation instant.
    pub evaluated_at: DateTime<Utc>,
    /// Number of targets the action would touch.
    pub target_count: u64,
}

/// Stateless guardrail engine evaluating proposed executions.
///
/// Never mutates state; its only dependency beyond the injected policy is a
/// read-only usage counter.
#[derive(Clone)]
pub struct SafetyValidator {
    usage: Arc<dyn ExecutionUsageSource>,
    policy: SafetyPolicy,
}

impl SafetyValidator {
    /// Creates a safety validator.
    #[must_use]
    pub fn new(usage: Arc<dyn ExecutionUsageSource>, policy: SafetyPolicy) -> Self {
        Self { usage, policy }
    }

    /// Evaluates every guardrail for one proposed execution.
    pub async fn evaluate(
        &self,
        tenant_id: TenantId,
        definition: &ActionDefinition,
        context: &SafetyContext,
    ) -> AppResult<SafetyCheckResult> {
        let mut checks = Vec::with_capacity(4);

        let kind = definition.action_kind();
        let denied = self.policy.denied_action_kinds.contains(&kind);
        checks.push(SafetyCheck {
            name: "action_kind_allowed".to_owned(),
            passed: !denied,
            detail: if denied {
                format!("action kind '{}' is denied by policy", kind.as_str())
            } else {
                format!("action kind '{}' is allowed", kind.as_str())
            },
        });

        let since = context.evaluated_at - Duration::hours(1);
        let recent = self
            .usage
            .count_executions_started_since(tenant_id, definition.logical_name().as_str(), since)
            .await?;
        let limit = i64::from(self.policy.max_executions_per_hour);
        checks.push(SafetyCheck {
            name: "hourly_rate_limit".to_owned(),
            passed: recent < limit,
            detail: format!("{recent} execution(s) started in the last hour, limit {limit}"),
        });

        if let Some((start, end)) = self.policy.allowed_utc_hours {
            let hour = context.evaluated_at.hour();
            let allowed = window_allows(u32::from(start), u32::from(end), hour);
            checks.push(SafetyCheck {
                name: "execution_window".to_owned(),
                passed: allowed,
                detail: if allowed {
                    format!("current UTC hour {hour} is inside window {start:02}:00-{end:02}:00")
                } else {
                    format!("current UTC hour {hour} is outside window {start:02}:00-{end:02}:00")
                },
            });
        }

        let max_targets = u64::from(self.policy.max_targets);
        checks.push(SafetyCheck {
            name: "blast_radius".to_owned(),
            passed: context.target_count <= max_targets,
            detail: format!(
                "execution touches {} target(s), limit {max_targets}",
                context.target_count
            ),
        });

        Ok(SafetyCheckResult::from_checks(checks))
    }
}

fn window_allows(start: u32, end: u32, hour: u32) -> bool {
    if start == end {
        // Degenerate full-day window.
        return true;
    }

    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}
