use async_trait::async_trait;
use remedia_core::AppResult;

/// One held fingerprint lock claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Mutual-exclusion port guarding the submit dedup-check/create sequence.
///
/// Held only across that sequence; it never spans the durable
/// pending-approval wait.
#[async_trait]
pub trait FingerprintLockCoordinator: Send + Sync {
    /// Attempts to acquire the lock for one fingerprint scope.
    async fn try_acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<FingerprintLease>>;

    /// Releases one held lock using token compare-and-delete semantics.
    async fn release(&self, lease: &FingerprintLease) -> AppResult<()>;
}
