use keystone_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

/// Why an access check was denied.
///
/// Only used for logging and tests; collaborators see a uniform denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The principal is not bound to any tenant.
    UnknownPrincipal,
    /// The resource belongs to another tenant.
    TenantMismatch,
    /// The principal lacks the permission.
    MissingPermission,
}

/// Outcome of a tenant-scoped access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum AccessDecision {
    /// Tenant matches and the permission is in force.
    Allowed,
    /// Access is denied.
    Denied(DenialReason),
}

impl AccessDecision {
    /// Returns whether access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Tenant isolation check.
///
/// It runs before permission resolution and only ever combines with it by AND.
/// Holding the `admin` role in one tenant grants nothing in another.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantGuard;

impl TenantGuard {
    /// Returns whether a principal of `principal_tenant` may touch a resource
    /// owned by `resource_tenant`.
    #[must_use]
    pub fn permits(principal_tenant: TenantId, resource_tenant: TenantId) -> bool {
        principal_tenant == resource_tenant
    }

    /// Fails with [`AppError::Unauthorized`] on a tenant mismatch.
    pub fn ensure_same_tenant(
        principal_tenant: TenantId,
        resource_tenant: TenantId,
    ) -> AppResult<()> {
        if Self::permits(principal_tenant, resource_tenant) {
            return Ok(());
        }

        Err(AppError::Unauthorized(format!(
            "resource belongs to tenant '{resource_tenant}', not '{principal_tenant}'"
        )))
    }

    /// Combines the tenant check with a permission result.
    #[must_use]
    pub fn decide(
        principal_tenant: TenantId,
        resource_tenant: TenantId,
        has_permission: bool,
    ) -> AccessDecision {
        if !Self::permits(principal_tenant, resource_tenant) {
            AccessDecision::Denied(DenialReason::TenantMismatch)
        } else if has_permission {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied(DenialReason::MissingPermission)
        }
    }
}

#[cfg(test)]
mod tests {
    use keystone_core::{AppError, TenantId};

    use super::{AccessDecision, DenialReason, TenantGuard};

    #[test]
    fn permission_in_another_tenant_never_allows() {
        let own = TenantId::new();
        let other = TenantId::new();

        assert_eq!(
            TenantGuard::decide(own, other, true),
            AccessDecision::Denied(DenialReason::TenantMismatch)
        );
        assert!(TenantGuard::decide(own, own, true).is_allowed());
        assert_eq!(
            TenantGuard::decide(own, own, false),
            AccessDecision::Denied(DenialReason::MissingPermission)
        );
    }

    #[test]
    fn ensure_same_tenant_reports_unauthorized() {
        let result = TenantGuard::ensure_same_tenant(TenantId::new(), TenantId::new());
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
