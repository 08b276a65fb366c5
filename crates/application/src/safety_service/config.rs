use remedia_domain::ActionKind;

/// Guardrail configuration applied to every proposed execution.
///
/// Process-level configuration; the denied kinds act as the tenant
/// deployment's deny-list.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyPolicy {
    /// Maximum executions of one definition started per rolling hour.
    pub max_executions_per_hour: u32,
    /// Action kinds that may never execute.
    pub denied_action_kinds: Vec<ActionKind>,
    /// Optional allowed execution window as (start, end) UTC hours.
    ///
    /// The start hour is inclusive and the end hour exclusive; a window
    /// that wraps midnight (for example 22 to 6) is valid.
    pub allowed_utc_hours: Option<(u8, u8)>,
    /// Maximum number of targets one execution may touch.
    pub max_targets: u32,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            max_executions_per_hour: 20,
            denied_action_kinds: Vec::new(),
            allowed_utc_hours: None,
            max_targets: 100,
        }
    }
}
