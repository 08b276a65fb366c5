use std::fmt::{Display, Formatter};

use remedia_core::TenantId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic deduplication key for one (definition, trigger instance) pair.
///
/// Equal inputs produce equal fingerprints in every process, which is what
/// lets concurrent submissions collapse onto a single execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionFingerprint(String);

impl ExecutionFingerprint {
    /// Computes the fingerprint for a definition and trigger instance.
    #[must_use]
    pub fn compute(
        tenant_id: TenantId,
        definition_logical_name: &str,
        trigger_instance_key: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_uuid().as_bytes());
        hasher.update([0x1f]);
        hasher.update(definition_logical_name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(trigger_instance_key.as_bytes());

        let digest = hasher.finalize();
        let mut encoded = String::with_capacity(digest.len() * 2);
        for byte in digest {
            encoded.push_str(&format!("{byte:02x}"));
        }

        Self(encoded)
    }

    /// Restores a fingerprint from its stored value.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the hex-encoded fingerprint value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ExecutionFingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
