use async_trait::async_trait;

use keystone_core::{AppResult, PrincipalId, TenantId};
use keystone_domain::{
    PermissionDefinition, PermissionKey, PermissionOverride, RoleAssignment, RoleDefinition,
    RoleId, RoleKey,
};

use super::inputs::CreateRoleInput;

/// Write-side repository port for catalog, role, assignment and override
/// administration.
///
/// Implementations validate referential integrity (unknown rows yield
/// `NotFound`, duplicates yield `Conflict`); tenant and policy checks belong to
/// the service.
#[async_trait]
pub trait SecurityAdminRepository: Send + Sync {
    /// Lists the global permission catalog.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Finds one catalog entry.
    async fn find_permission(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<Option<PermissionDefinition>>;

    /// Adds a catalog entry.
    async fn register_permission(
        &self,
        definition: PermissionDefinition,
    ) -> AppResult<PermissionDefinition>;

    /// Changes the activation flag of a catalog entry.
    async fn set_permission_active(
        &self,
        permission_key: &PermissionKey,
        is_active: bool,
    ) -> AppResult<PermissionDefinition>;

    /// Lists tenant roles and system roles with their permissions.
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>>;

    /// Finds a role visible to the tenant, preferring tenant-owned roles.
    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_key: &RoleKey,
    ) -> AppResult<Option<RoleDefinition>>;

    /// Creates a tenant role and attaches its initial permissions.
    async fn create_role(
        &self,
        tenant_id: TenantId,
        created_by: PrincipalId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition>;

    /// Changes the activation flag of a role.
    async fn set_role_active(&self, role_id: RoleId, is_active: bool)
    -> AppResult<RoleDefinition>;

    /// Attaches a permission to a role; returns `false` when already attached.
    async fn attach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
        granted_by: PrincipalId,
    ) -> AppResult<bool>;

    /// Detaches a permission from a role; returns `false` when not attached.
    async fn detach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool>;

    /// Creates or refreshes a role assignment.
    async fn assign_role(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment>;

    /// Removes a role assignment; returns `false` when none existed.
    async fn revoke_role(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<bool>;

    /// Lists role assignments in tenant scope.
    async fn list_role_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>>;

    /// Inserts or replaces the override for (principal, permission).
    async fn upsert_override(&self, value: PermissionOverride) -> AppResult<PermissionOverride>;

    /// Deletes the override for (principal, permission); returns `false` when
    /// none existed.
    async fn delete_override(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool>;

    /// Lists stored overrides for a principal, including expired rows.
    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>>;

    /// Deletes a principal together with its assignments and overrides.
    async fn remove_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<bool>;
}
