use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Identity of the subject performing an operation.
///
/// Carried through every service call so that audit events and lifecycle
/// records name who acted; authorization itself happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    subject: String,
    display_name: String,
    tenant_id: TenantId,
}

impl ActorIdentity {
    /// Creates an actor identity from authentication and tenancy data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            tenant_id,
        }
    }

    /// Returns the stable subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current actor.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the tenant linked to the identity.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
