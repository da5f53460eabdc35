use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::AuthorizationRepository;
use keystone_core::{AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{ADMIN_ROLE_KEY, PermissionDefinition, PermissionOverride, RoleGrant};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_errors::database_error;
use crate::postgres_rows::{OverrideRow, PermissionRow, decode_permission_key, decode_role_key};

/// PostgreSQL-backed repository for permission resolution lookups.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleGrantRow {
    role_id: Uuid,
    role_key: String,
    role_is_active: bool,
    assignment_expires_at: Option<DateTime<Utc>>,
    permission_key: Option<String>,
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    principal_id: Uuid,
    tenant_id: Uuid,
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn principal_tenant(&self, principal_id: PrincipalId) -> AppResult<Option<TenantId>> {
        let tenant_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT tenant_id
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to resolve principal tenant", error))?;

        Ok(tenant_id.map(TenantId::from_uuid))
    }

    async fn list_permission_catalog(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT key, description, is_active
            FROM permissions
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to load permission catalog", error))?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }

    async fn list_role_grants_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleGrant>> {
        let rows = sqlx::query_as::<_, RoleGrantRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.key AS role_key,
                roles.is_active AS role_is_active,
                principal_roles.expires_at AS assignment_expires_at,
                role_permissions.permission_key
            FROM principal_roles
            INNER JOIN roles
                ON roles.id = principal_roles.role_id
            LEFT JOIN role_permissions
                ON role_permissions.role_id = roles.id
            WHERE principal_roles.tenant_id = $1
                AND principal_roles.principal_id = $2
                AND (roles.tenant_id IS NULL OR roles.tenant_id = principal_roles.tenant_id)
            ORDER BY roles.key, role_permissions.permission_key
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(principal_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to load role grants", error))?;

        let mut grants: Vec<(Uuid, RoleGrant)> = Vec::new();
        for row in rows {
            let position = match grants.iter().position(|(role_id, _)| *role_id == row.role_id) {
                Some(position) => position,
                None => {
                    grants.push((
                        row.role_id,
                        RoleGrant {
                            role_key: decode_role_key(row.role_key.as_str())?,
                            role_is_active: row.role_is_active,
                            assignment_expires_at: row.assignment_expires_at,
                            permissions: Vec::new(),
                        },
                    ));
                    grants.len() - 1
                }
            };

            if let Some(permission_key) = row.permission_key {
                grants[position]
                    .1
                    .permissions
                    .push(decode_permission_key(permission_key.as_str())?);
            }
        }

        Ok(grants.into_iter().map(|(_, grant)| grant).collect())
    }

    async fn list_overrides_for_principal(
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
        .map_err(|error| database_error("failed to load permission overrides", error))?;

        rows.into_iter().map(OverrideRow::into_override).collect()
    }

    async fn has_active_admin_assignment(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM principal_roles
                INNER JOIN roles
                    ON roles.id = principal_roles.role_id
                WHERE principal_roles.tenant_id = $1
                    AND principal_roles.principal_id = $2
                    AND roles.key = $3
                    AND roles.is_active
                    AND (roles.tenant_id IS NULL OR roles.tenant_id = principal_roles.tenant_id)
                    AND (principal_roles.expires_at IS NULL OR principal_roles.expires_at > $4)
            )
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(principal_id.as_uuid())
        .bind(ADMIN_ROLE_KEY)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| database_error("failed to check administrator assignment", error))
    }

    async fn list_principals(&self) -> AppResult<Vec<PrincipalIdentity>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id AS principal_id, tenant_id
            FROM principals
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list principals", error))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                PrincipalIdentity::new(
                    PrincipalId::from_uuid(row.principal_id),
                    TenantId::from_uuid(row.tenant_id),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests;
