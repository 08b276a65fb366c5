use async_trait::async_trait;
use chrono::{DateTime, Utc};
use remedia_core::{AppResult, TenantId};

/// Read-only usage counters consumed by safety checks.
///
/// The checker only reads; consumption happens implicitly as executions are
/// created.
#[async_trait]
pub trait ExecutionUsageSource: Send + Sync {
    /// Counts executions of one definition whose runner was dispatched at or
    /// after `since`.
    async fn count_executions_started_since(
        &self,
        tenant_id: TenantId,
        definition_logical_name: &str,
        since: DateTime<Utc>,
    ) -> AppResult<i64>;
}
