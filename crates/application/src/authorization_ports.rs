use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_core::{AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{PermissionDefinition, PermissionOverride, RoleGrant};

/// Read-side repository port used by permission resolution.
///
/// Every method is a leaf lookup. None of them may consult resolved
/// permissions, so the administrator check can never recurse into the resolver.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Returns the tenant a principal belongs to, or `None` when unknown.
    async fn principal_tenant(&self, principal_id: PrincipalId) -> AppResult<Option<TenantId>>;

    /// Lists the global permission catalog, including inactive entries.
    async fn list_permission_catalog(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Lists role assignments held by the principal, joined with role data.
    async fn list_role_grants_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleGrant>>;

    /// Lists stored overrides for the principal, including expired rows.
    async fn list_overrides_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>>;

    /// Returns whether the principal holds an in-force assignment to the
    /// active `admin` role at `now`.
    async fn has_active_admin_assignment(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Lists every known principal with its tenant binding.
    async fn list_principals(&self) -> AppResult<Vec<PrincipalIdentity>>;
}
