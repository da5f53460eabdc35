use serde::{Deserialize, Serialize};

use crate::{PrincipalId, TenantId};

/// Authenticated principal bound to its tenant, as seen by the authorization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalIdentity {
    principal_id: PrincipalId,
    tenant_id: TenantId,
}

impl PrincipalIdentity {
    /// Creates an identity from the principal id and its owning tenant.
    #[must_use]
    pub fn new(principal_id: PrincipalId, tenant_id: TenantId) -> Self {
        Self {
            principal_id,
            tenant_id,
        }
    }

    /// Returns the stable principal identifier.
    #[must_use]
    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// Returns the tenant the principal belongs to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
