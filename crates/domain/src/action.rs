use remedia_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trigger source that can spawn executions of an action definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTrigger {
    /// Detected behavioral pattern trigger.
    Pattern {
        /// Pattern type emitted by the detection sweep.
        pattern_type: String,
        /// Opaque configuration interpreted by the detector.
        config: Value,
    },
    /// Metric threshold trigger.
    Threshold {
        /// Metric logical name the threshold watches.
        metric: String,
        /// Opaque configuration interpreted by the detector.
        config: Value,
    },
    /// Recurring schedule trigger.
    Schedule {
        /// Cadence expression interpreted by the detection sweep.
        cadence: String,
        /// Opaque configuration interpreted by the detector.
        config: Value,
    },
    /// External event trigger.
    Event {
        /// Event type the definition subscribes to.
        event_type: String,
        /// Opaque configuration interpreted by the detector.
        config: Value,
    },
}

impl ActionTrigger {
    /// Returns stable trigger type value.
    #[must_use]
    pub fn trigger_type(&self) -> &'static str {
        match self {
            Self::Pattern { .. } => "pattern",
            Self::Threshold { .. } => "threshold",
            Self::Schedule { .. } => "schedule",
            Self::Event { .. } => "event",
        }
    }

    /// Returns the pattern type when this is a pattern trigger.
    #[must_use]
    pub fn pattern_type(&self) -> Option<&str> {
        match self {
            Self::Pattern { pattern_type, .. } => Some(pattern_type.as_str()),
            _ => None,
        }
    }

    /// Returns the opaque detector configuration.
    #[must_use]
    pub fn config(&self) -> &Value {
        match self {
            Self::Pattern { config, .. }
            | Self::Threshold { config, .. }
            | Self::Schedule { config, .. }
            | Self::Event { config, .. } => config,
        }
    }
}

/// Remediation action category dispatched through the runner registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Sends a nudge to the affected people.
    Reminder,
    /// Raises the condition to a higher organizational level.
    Escalation,
    /// Re-runs a failed organizational process step.
    Retry,
    /// Moves work items between assignees.
    Redistribute,
    /// Delivers an informational notification.
    Notify,
    /// Tenant-provided custom action.
    Custom,
}

impl ActionKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Escalation => "escalation",
            Self::Retry => "retry",
            Self::Redistribute => "redistribute",
            Self::Notify => "notify",
            Self::Custom => "custom",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "reminder" => Ok(Self::Reminder),
            "escalation" => Ok(Self::Escalation),
            "retry" => Ok(Self::Retry),
            "redistribute" => Ok(Self::Redistribute),
            "notify" => Ok(Self::Notify),
            "custom" => Ok(Self::Custom),
            _ => Err(AppError::Validation(format!(
                "unknown action kind '{value}'"
            ))),
        }
    }
}

/// Tenant-scoped reusable remediation action configuration.
///
/// Executions reference, never copy, their definition; edits to a definition
/// do not retroactively change in-flight executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    logical_name: NonEmptyString,
    display_name: NonEmptyString,
    description: Option<String>,
    trigger: ActionTrigger,
    action_kind: ActionKind,
    action_config: Value,
    requires_approval: bool,
    approver_roles: Vec<String>,
    is_active: bool,
}

/// Input payload used to construct a validated action definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDefinitionInput {
    /// Stable definition logical name.
    pub logical_name: String,
    /// User-facing definition display name.
    pub display_name: String,
    /// Optional definition description.
    pub description: Option<String>,
    /// Trigger configuration.
    pub trigger: ActionTrigger,
    /// Action category dispatched through the runner registry.
    pub action_kind: ActionKind,
    /// Action configuration interpreted by the runner.
    pub action_config: Value,
    /// Whether executions must pass human approval before dispatch.
    pub requires_approval: bool,
    /// Roles eligible to approve, snapshotted onto each approval request.
    pub approver_roles: Vec<String>,
    /// Active/inactive flag; inactive definitions spawn no new executions.
    pub is_active: bool,
}

impl ActionDefinition {
    /// Creates a validated action definition.
    pub fn new(input: ActionDefinitionInput) -> AppResult<Self> {
        let ActionDefinitionInput {
            logical_name,
            display_name,
            description,
            trigger,
            action_kind,
            action_config,
            requires_approval,
            approver_roles,
            is_active,
        } = input;

        validate_trigger(&trigger)?;

        if !action_config.is_object() {
            return Err(AppError::Validation(
                "action_config must be a JSON object".to_owned(),
            ));
        }

        let approver_roles = normalize_roles(approver_roles)?;
        if requires_approval && approver_roles.is_empty() {
            return Err(AppError::Validation(
                "definitions requiring approval must name at least one approver role".to_owned(),
            ));
        }

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            logical_name: NonEmptyString::new(logical_name)?,
            display_name: NonEmptyString::new(display_name)?,
            description,
            trigger,
            action_kind,
            action_config,
            requires_approval,
            approver_roles,
            is_active,
        })
    }

    /// Returns definition logical name.
    #[must_use]
    pub fn logical_name(&self) -> &NonEmptyString {
        &self.logical_name
    }

    /// Returns definition display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns optional definition description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns trigger configuration.
    #[must_use]
    pub fn trigger(&self) -> &ActionTrigger {
        &self.trigger
    }

    /// Returns the action category.
    #[must_use]
    pub fn action_kind(&self) -> ActionKind {
        self.action_kind
    }

    /// Returns the action configuration interpreted by the runner.
    #[must_use]
    pub fn action_config(&self) -> &Value {
        &self.action_config
    }

    /// Returns whether executions must pass human approval.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    /// Returns the roles eligible to approve executions.
    #[must_use]
    pub fn approver_roles(&self) -> &[String] {
        self.approver_roles.as_slice()
    }

    /// Returns whether the definition may spawn new executions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

fn validate_trigger(trigger: &ActionTrigger) -> AppResult<()> {
    let (field, value) = match trigger {
        ActionTrigger::Pattern { pattern_type, .. } => ("pattern_type", pattern_type),
        ActionTrigger::Threshold { metric, .. } => ("metric", metric),
        ActionTrigger::Schedule { cadence, .. } => ("cadence", cadence),
        ActionTrigger::Event { event_type, .. } => ("event_type", event_type),
    };

    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "trigger {field} must not be empty"
        )));
    }

    if !trigger.config().is_object() {
        return Err(AppError::Validation(
            "trigger config must be a JSON object".to_owned(),
        ));
    }

    Ok(())
}

fn normalize_roles(roles: Vec<String>) -> AppResult<Vec<String>> {
    let mut normalized = Vec::with_capacity(roles.len());

    for role in roles {
        let trimmed = role.trim().to_owned();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "approver roles must not contain empty values".to_owned(),
            ));
        }

        if !normalized.contains(&trimmed) {
            normalized.push(trimmed);
        }
    }

    Ok(normalized)
}
