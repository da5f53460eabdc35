use async_trait::async_trait;
use keystone_application::security_admin_ports::{CreateRoleInput, SecurityAdminRepository};
use keystone_core::{AppError, AppResult, PrincipalId, TenantId};
use keystone_domain::{
    PermissionDefinition, PermissionKey, PermissionOverride, RoleAssignment, RoleDefinition,
    RoleId, RoleKey,
};
use sqlx::PgPool;

use crate::postgres_errors::{database_error, is_foreign_key_violation, is_unique_violation};
use crate::postgres_rows::{AssignmentRow, OverrideRow, PermissionRow, RoleRow, aggregate_roles};

mod assignments;
mod catalog;
mod overrides;
mod roles;

/// PostgreSQL-backed repository for catalog, role and override administration.
#[derive(Clone)]
pub struct PostgresSecurityAdminRepository {
    pool: PgPool,
}

impl PostgresSecurityAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAdminRepository for PostgresSecurityAdminRepository {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.list_permissions_impl().await
    }

    async fn find_permission(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<Option<PermissionDefinition>> {
        self.find_permission_impl(permission_key).await
    }

    async fn register_permission(
        &self,
        definition: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        self.register_permission_impl(definition).await
    }

    async fn set_permission_active(
        &self,
        permission_key: &PermissionKey,
        is_active: bool,
    ) -> AppResult<PermissionDefinition> {
        self.set_permission_active_impl(permission_key, is_active)
            .await
    }

    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        self.list_roles_impl(tenant_id).await
    }

    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_key: &RoleKey,
    ) -> AppResult<Option<RoleDefinition>> {
        self.find_role_impl(tenant_id, role_key).await
    }

    async fn create_role(
        &self,
        tenant_id: TenantId,
        created_by: PrincipalId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.create_role_impl(tenant_id, created_by, input).await
    }

    async fn set_role_active(
        &self,
        role_id: RoleId,
        is_active: bool,
    ) -> AppResult<RoleDefinition> {
        self.set_role_active_impl(role_id, is_active).await
    }

    async fn attach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
        granted_by: PrincipalId,
    ) -> AppResult<bool> {
        self.attach_permission_impl(role_id, permission_key, granted_by)
            .await
    }

    async fn detach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        self.detach_permission_impl(role_id, permission_key).await
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        self.assign_role_impl(assignment).await
    }

    async fn revoke_role(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        self.revoke_role_impl(tenant_id, principal_id, role_id)
            .await
    }

    async fn list_role_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>> {
        self.list_role_assignments_impl(tenant_id).await
    }

    async fn upsert_override(&self, value: PermissionOverride) -> AppResult<PermissionOverride> {
        self.upsert_override_impl(value).await
    }

    async fn delete_override(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        self.delete_override_impl(tenant_id, principal_id, permission_key)
            .await
    }

    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.list_overrides_impl(tenant_id, principal_id).await
    }

    async fn remove_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM principals
            WHERE id = $1
                AND tenant_id = $2
            "#,
        )
        .bind(principal_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to remove principal", error))?;

        Ok(result.rows_affected() > 0)
    }
}
