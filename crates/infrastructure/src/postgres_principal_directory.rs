use async_trait::async_trait;
use keystone_application::PrincipalDirectory;
use keystone_core::{AppError, AppResult, PrincipalIdentity, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::postgres_errors::{database_error, is_foreign_key_violation};

/// PostgreSQL-backed tenant and principal provisioning.
#[derive(Clone)]
pub struct PostgresPrincipalDirectory {
    pool: PgPool,
}

impl PostgresPrincipalDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalDirectory for PostgresPrincipalDirectory {
    async fn ensure_tenant(&self, tenant_id: TenantId, name: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to ensure tenant", error))?;

        Ok(())
    }

    async fn register_principal(
        &self,
        principal: PrincipalIdentity,
        display_name: &str,
    ) -> AppResult<()> {
        let stored_tenant = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO principals (id, tenant_id, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET display_name = principals.display_name
            RETURNING tenant_id
            "#,
        )
        .bind(principal.principal_id().as_uuid())
        .bind(principal.tenant_id().as_uuid())
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                return AppError::NotFound(format!(
                    "tenant '{}' does not exist",
                    principal.tenant_id()
                ));
            }
            database_error("failed to register principal", error)
        })?;

        if stored_tenant != principal.tenant_id().as_uuid() {
            return Err(AppError::Conflict(format!(
                "principal '{}' already belongs to another tenant",
                principal.principal_id()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keystone_application::{AuthorizationRepository, PrincipalDirectory};
    use keystone_core::{AppError, PrincipalId, PrincipalIdentity, TenantId};

    use super::PostgresPrincipalDirectory;
    use crate::PostgresAuthorizationRepository;
    use crate::postgres_test_support::test_pool;

    #[tokio::test]
    async fn registered_principal_resolves_to_its_tenant() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let directory = PostgresPrincipalDirectory::new(pool.clone());
        let lookups = PostgresAuthorizationRepository::new(pool);

        let tenant_id = TenantId::new();
        let principal = PrincipalIdentity::new(PrincipalId::new(), tenant_id);
        assert!(directory.ensure_tenant(tenant_id, "Garage North").await.is_ok());
        assert!(directory.ensure_tenant(tenant_id, "Garage North").await.is_ok());
        assert!(directory.register_principal(principal, "Dana").await.is_ok());
        assert!(directory.register_principal(principal, "Dana").await.is_ok());

        assert!(matches!(
            lookups.principal_tenant(principal.principal_id()).await,
            Ok(Some(found)) if found == tenant_id
        ));

        let other_tenant = TenantId::new();
        assert!(directory.ensure_tenant(other_tenant, "Garage South").await.is_ok());
        let moved = PrincipalIdentity::new(principal.principal_id(), other_tenant);
        assert!(matches!(
            directory.register_principal(moved, "Dana").await,
            Err(AppError::Conflict(_))
        ));
    }
}
