use super::*;

use uuid::Uuid;

impl PostgresSecurityAdminRepository {
    pub(super) async fn list_roles_impl(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.tenant_id,
                roles.key AS role_key,
                roles.display_name,
                roles.is_system,
                roles.is_active,
                role_permissions.permission_key
            FROM roles
            LEFT JOIN role_permissions
                ON role_permissions.role_id = roles.id
            WHERE roles.tenant_id IS NULL OR roles.tenant_id = $1
            ORDER BY roles.key, roles.tenant_id NULLS LAST, role_permissions.permission_key
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list roles", error))?;

        aggregate_roles(rows)
    }

    pub(super) async fn find_role_impl(
        &self,
        tenant_id: TenantId,
        role_key: &RoleKey,
    ) -> AppResult<Option<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.tenant_id,
                roles.key AS role_key,
                roles.display_name,
                roles.is_system,
                roles.is_active,
                role_permissions.permission_key
            FROM roles
            LEFT JOIN role_permissions
                ON role_permissions.role_id = roles.id
            WHERE roles.key = $2
                AND (roles.tenant_id IS NULL OR roles.tenant_id = $1)
            ORDER BY roles.tenant_id NULLS LAST, role_permissions.permission_key
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_key.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to find role", error))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }

    async fn find_role_by_id(&self, role_id: RoleId) -> AppResult<RoleDefinition> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.tenant_id,
                roles.key AS role_key,
                roles.display_name,
                roles.is_system,
                roles.is_active,
                role_permissions.permission_key
            FROM roles
            LEFT JOIN role_permissions
                ON role_permissions.role_id = roles.id
            WHERE roles.id = $1
            ORDER BY role_permissions.permission_key
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to load role", error))?;

        aggregate_roles(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    pub(super) async fn create_role_impl(
        &self,
        tenant_id: TenantId,
        created_by: PrincipalId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("failed to begin transaction", error))?;

        let role_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, key, display_name, is_system, is_active, created_by)
            VALUES ($1, $2, $3, $4, false, true, $5)
            "#,
        )
        .bind(role_id)
        .bind(tenant_id.as_uuid())
        .bind(input.key.as_str())
        .bind(input.display_name.trim())
        .bind(created_by.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!(
                    "role '{}' already exists for tenant '{tenant_id}'",
                    input.key
                ));
            }
            if is_foreign_key_violation(&error) {
                return AppError::NotFound(format!("tenant '{tenant_id}' does not exist"));
            }
            database_error("failed to create role", error)
        })?;

        for permission_key in &input.permissions {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_key, granted_by)
                VALUES ($1, $2, $3)
                ON CONFLICT (role_id, permission_key) DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_key.as_str())
            .bind(created_by.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                if is_foreign_key_violation(&error) {
                    return AppError::NotFound(format!(
                        "permission '{permission_key}' does not exist"
                    ));
                }
                database_error("failed to attach role permission", error)
            })?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| database_error("failed to commit transaction", error))?;

        self.find_role_by_id(RoleId::from_uuid(role_id)).await
    }

    pub(super) async fn set_role_active_impl(
        &self,
        role_id: RoleId,
        is_active: bool,
    ) -> AppResult<RoleDefinition> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET is_active = $2
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(is_active)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to update role", error))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist"
            )));
        }

        self.find_role_by_id(role_id).await
    }

    pub(super) async fn attach_permission_impl(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
        granted_by: PrincipalId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_key, granted_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, permission_key) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_key.as_str())
        .bind(granted_by.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                return AppError::NotFound(format!(
                    "role '{role_id}' or permission '{permission_key}' does not exist"
                ));
            }
            database_error("failed to attach role permission", error)
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn detach_permission_impl(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = $1
                AND permission_key = $2
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to detach role permission", error))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let role_exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| database_error("failed to resolve role", error))?;

        if !role_exists {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist"
            )));
        }

        Ok(false)
    }
}
