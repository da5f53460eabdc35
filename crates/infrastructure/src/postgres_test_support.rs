//! Shared helpers for PostgreSQL adapter tests.
//!
//! Tests return early when `DATABASE_URL` is not set.

use keystone_core::{PrincipalId, PrincipalIdentity, TenantId};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres tests: {error}");
    }

    Some(pool)
}

pub(crate) async fn ensure_tenant(pool: &PgPool, tenant_id: TenantId, name: &str) {
    let insert = sqlx::query(
        r#"
            INSERT INTO tenants (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(name)
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

pub(crate) async fn new_principal(pool: &PgPool, tenant_id: TenantId) -> PrincipalIdentity {
    ensure_tenant(pool, tenant_id, "Test Workshop").await;

    let principal = PrincipalIdentity::new(PrincipalId::new(), tenant_id);
    let insert = sqlx::query(
        r#"
            INSERT INTO principals (id, tenant_id, display_name)
            VALUES ($1, $2, 'Test Principal')
            "#,
    )
    .bind(principal.principal_id().as_uuid())
    .bind(tenant_id.as_uuid())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
    principal
}
