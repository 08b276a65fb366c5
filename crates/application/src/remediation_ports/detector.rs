use async_trait::async_trait;
use remedia_core::{AppResult, TenantId};
use serde_json::Value;

/// One detected organizational condition awaiting remediation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPattern {
    /// Tenant the pattern was detected in.
    pub tenant_id: TenantId,
    /// Pattern type matched against definition triggers.
    pub pattern_type: String,
    /// Stable key identifying this occurrence for deduplication.
    pub instance_key: String,
    /// Detector payload describing the condition.
    pub payload: Value,
}

/// Port for the external pattern detection collaborator.
#[async_trait]
pub trait PatternDetector: Send + Sync {
    /// Returns currently detected patterns awaiting remediation.
    async fn detect(&self) -> AppResult<Vec<DetectedPattern>>;
}
