use chrono::{DateTime, Utc};
use keystone_core::{PrincipalId, TenantId};
use serde::{Deserialize, Serialize};

use crate::PermissionKey;

/// Principal-specific exception to role-derived permissions.
///
/// At most one row exists per (principal, permission); writes upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Principal the override applies to.
    pub principal_id: PrincipalId,
    /// Tenant of the principal.
    pub tenant_id: TenantId,
    /// Overridden permission.
    pub permission_key: PermissionKey,
    /// `true` grants the permission, `false` revokes it.
    pub is_granted: bool,
    /// Optional expiry; expired overrides are treated as absent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Justification captured from the administrator.
    pub reason: String,
    /// Administrator that wrote the override.
    pub granted_by: PrincipalId,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PermissionOverride {
    /// Returns whether the override is in force at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
