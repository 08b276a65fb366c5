//! Redis-backed distributed lock for submission fingerprints.

use async_trait::async_trait;
use redis::{AsyncCommands, Script};

use remedia_application::{FingerprintLease, FingerprintLockCoordinator};
use remedia_core::{AppError, AppResult};

const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of fingerprint lock coordination.
#[derive(Clone)]
pub struct RedisFingerprintLock {
    client: redis::Client,
    key_prefix: String,
}

impl RedisFingerprintLock {
    /// Creates one lock coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }
}

#[async_trait]
impl FingerprintLockCoordinator for RedisFingerprintLock {
    async fn try_acquire(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<FingerprintLease>> {
        if scope_key.trim().is_empty() {
            return Err(AppError::Validation(
                "fingerprint lock scope_key must not be empty".to_owned(),
            ));
        }

        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "fingerprint lock holder_id must not be empty".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "fingerprint lock lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let acquired: bool = connection
            .set_nx(key.as_str(), token.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire fingerprint lock: {error}"))
            })?;

        if !acquired {
            return Ok(None);
        }

        connection
            .expire::<_, ()>(key.as_str(), i64::from(lease_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to set fingerprint lock ttl: {error}"))
            })?;

        Ok(Some(FingerprintLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release(&self, lease: &FingerprintLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LOCK_SCRIPT);

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release fingerprint lock: {error}"))
            })?;

        Ok(())
    }
}
