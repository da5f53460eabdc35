use super::*;

impl PostgresSecurityAdminRepository {
    pub(super) async fn upsert_override_impl(
        &self,
        value: PermissionOverride,
    ) -> AppResult<PermissionOverride> {
        let row = sqlx::query_as::<_, OverrideRow>(
            r#"
            INSERT INTO permission_overrides (
                principal_id,
                tenant_id,
                permission_key,
                is_granted,
                expires_at,
                reason,
                granted_by,
                updated_at
            )
            SELECT principals.id, principals.tenant_id, $3, $4, $5, $6, $7, $8
            FROM principals
            WHERE principals.id = $1
                AND principals.tenant_id = $2
            ON CONFLICT (principal_id, permission_key) DO UPDATE
            SET is_granted = EXCLUDED.is_granted,
                expires_at = EXCLUDED.expires_at,
                reason = EXCLUDED.reason,
                granted_by = EXCLUDED.granted_by,
                updated_at = EXCLUDED.updated_at
            RETURNING
                principal_id,
                tenant_id,
                permission_key,
                is_granted,
                expires_at,
                reason,
                granted_by,
                updated_at
            "#,
        )
        .bind(value.principal_id.as_uuid())
        .bind(value.tenant_id.as_uuid())
        .bind(value.permission_key.as_str())
        .bind(value.is_granted)
        .bind(value.expires_at)
        .bind(value.reason.as_str())
        .bind(value.granted_by.as_uuid())
        .bind(value.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                return AppError::NotFound(format!(
                    "permission '{}' does not exist",
                    value.permission_key
                ));
            }
            database_error("failed to write permission override", error)
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "principal '{}' does not exist in tenant '{}'",
                value.principal_id, value.tenant_id
            ))
        })?;

        row.into_override()
    }

    pub(super) async fn delete_override_impl(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_overrides
            WHERE tenant_id = $1
                AND principal_id = $2
                AND permission_key = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(principal_id.as_uuid())
        .bind(permission_key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to delete permission override", error))?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn list_overrides_impl(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        let rows = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT
                principal_id,
                tenant_id,
                permission_key,
                is_granted,
                expires_at,
                reason,
                granted_by,
                updated_at
            FROM permission_overrides
            WHERE tenant_id = $1
                AND principal_id = $2
            ORDER BY permission_key
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(principal_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list permission overrides", error))?;

        rows.into_iter().map(OverrideRow::into_override).collect()
    }
}
