use super::*;

use chrono::{DateTime, Utc};

impl PostgresSecurityAdminRepository {
    pub(super) async fn assign_role_impl(
        &self,
        assignment: RoleAssignment,
    ) -> AppResult<RoleAssignment> {
        let assigned_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO principal_roles (
                principal_id,
                role_id,
                tenant_id,
                assigned_at,
                expires_at,
                assigned_by
            )
            SELECT principals.id, roles.id, principals.tenant_id, $4, $5, $6
            FROM principals
            INNER JOIN roles
                ON roles.id = $2
                AND (roles.tenant_id IS NULL OR roles.tenant_id = principals.tenant_id)
            WHERE principals.id = $1
                AND principals.tenant_id = $3
            ON CONFLICT (principal_id, role_id) DO UPDATE
            SET assigned_at = EXCLUDED.assigned_at,
                expires_at = EXCLUDED.expires_at,
                assigned_by = EXCLUDED.assigned_by
            RETURNING assigned_at
            "#,
        )
        .bind(assignment.principal_id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.tenant_id.as_uuid())
        .bind(assignment.assigned_at)
        .bind(assignment.expires_at)
        .bind(assignment.assigned_by.map(|principal_id| principal_id.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to assign role", error))?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "principal '{}' or role '{}' does not exist in tenant '{}'",
                assignment.principal_id, assignment.role_key, assignment.tenant_id
            ))
        })?;

        Ok(RoleAssignment {
            assigned_at,
            ..assignment
        })
    }

    pub(super) async fn revoke_role_impl(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM principal_roles
            WHERE tenant_id = $1
                AND principal_id = $2
                AND role_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(principal_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to revoke role", error))?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn list_role_assignments_impl(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                principal_roles.principal_id,
                principal_roles.tenant_id,
                principal_roles.role_id,
                roles.key AS role_key,
                principal_roles.assigned_at,
                principal_roles.expires_at,
                principal_roles.assigned_by
            FROM principal_roles
            INNER JOIN roles
                ON roles.id = principal_roles.role_id
            WHERE principal_roles.tenant_id = $1
            ORDER BY principal_roles.assigned_at, principal_roles.principal_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list role assignments", error))?;

        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }
}
