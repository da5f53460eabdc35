use chrono::{Duration, Utc};
use keystone_application::AuthorizationRepository;
use keystone_core::{PrincipalId, TenantId};
use uuid::Uuid;

use super::PostgresAuthorizationRepository;
use crate::postgres_test_support::{new_principal, test_pool};

#[tokio::test]
async fn unknown_principal_has_no_tenant() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAuthorizationRepository::new(pool);

    assert!(matches!(
        repository.principal_tenant(PrincipalId::new()).await,
        Ok(None)
    ));
}

#[tokio::test]
async fn catalog_includes_seeded_permissions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAuthorizationRepository::new(pool);

    let catalog = repository.list_permission_catalog().await.unwrap_or_default();
    assert!(
        catalog
            .iter()
            .any(|entry| entry.key().as_str() == "security.roles.manage")
    );
}

#[tokio::test]
async fn role_grants_group_permissions_per_role() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAuthorizationRepository::new(pool.clone());
    let principal = new_principal(&pool, TenantId::new()).await;

    let role_id = Uuid::new_v4();
    let role_insert = sqlx::query(
        r#"
            INSERT INTO roles (id, tenant_id, key, display_name, is_system, is_active)
            VALUES ($1, $2, 'cashier', 'Cashier', false, false)
            "#,
    )
    .bind(role_id)
    .bind(principal.tenant_id().as_uuid())
    .execute(&pool)
    .await;
    assert!(role_insert.is_ok());

    for permission_key in ["invoices.view", "invoices.create"] {
        let grant_insert = sqlx::query(
            r#"
                INSERT INTO role_permissions (role_id, permission_key)
                VALUES ($1, $2)
                "#,
        )
        .bind(role_id)
        .bind(permission_key)
        .execute(&pool)
        .await;
        assert!(grant_insert.is_ok());
    }

    let expires_at = Utc::now() + Duration::days(1);
    let assignment_insert = sqlx::query(
        r#"
            INSERT INTO principal_roles (principal_id, role_id, tenant_id, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
    )
    .bind(principal.principal_id().as_uuid())
    .bind(role_id)
    .bind(principal.tenant_id().as_uuid())
    .bind(expires_at)
    .execute(&pool)
    .await;
    assert!(assignment_insert.is_ok());

    let grants = repository
        .list_role_grants_for_principal(principal.tenant_id(), principal.principal_id())
        .await
        .unwrap_or_default();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].role_key.as_str(), "cashier");
    assert!(!grants[0].role_is_active);
    assert_eq!(grants[0].permissions.len(), 2);
    assert!(grants[0].assignment_expires_at.is_some());

    let other_tenant = repository
        .list_role_grants_for_principal(TenantId::new(), principal.principal_id())
        .await
        .unwrap_or_default();
    assert!(other_tenant.is_empty());

    let principals = repository.list_principals().await.unwrap_or_default();
    assert!(principals.contains(&principal));
}
