use super::*;

impl PostgresSecurityAdminRepository {
    pub(super) async fn list_permissions_impl(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT key, description, is_active
            FROM permissions
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list permissions", error))?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }

    pub(super) async fn find_permission_impl(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<Option<PermissionDefinition>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT key, description, is_active
            FROM permissions
            WHERE key = $1
            "#,
        )
        .bind(permission_key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to find permission", error))?;

        row.map(PermissionRow::into_definition).transpose()
    }

    pub(super) async fn register_permission_impl(
        &self,
        definition: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        sqlx::query(
            r#"
            INSERT INTO permissions (key, description, is_active)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(definition.key().as_str())
        .bind(definition.description())
        .bind(definition.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!(
                    "permission '{}' already exists",
                    definition.key()
                ));
            }
            database_error("failed to register permission", error)
        })?;

        Ok(definition)
    }

    pub(super) async fn set_permission_active_impl(
        &self,
        permission_key: &PermissionKey,
        is_active: bool,
    ) -> AppResult<PermissionDefinition> {
        sqlx::query_as::<_, PermissionRow>(
            r#"
            UPDATE permissions
            SET is_active = $2
            WHERE key = $1
            RETURNING key, description, is_active
            "#,
        )
        .bind(permission_key.as_str())
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to update permission", error))?
        .ok_or_else(|| AppError::NotFound(format!("permission '{permission_key}' does not exist")))?
        .into_definition()
    }
}
