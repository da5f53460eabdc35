use keystone_core::{AppError, PrincipalId, TenantId};
use keystone_domain::{PermissionModel, PermissionSource};

use crate::test_support::{Harness, key};
use crate::{AccessDecision, DenialReason};

#[tokio::test]
async fn has_permission_follows_role_grants() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let principal = harness.store.add_principal(tenant_id).await;
    harness
        .store
        .add_role(tenant_id, "mechanic", &["work_orders.view"])
        .await;
    harness.store.assign(principal, "mechanic", None).await;

    let service = &harness.authorization;
    let id = principal.principal_id();

    assert!(matches!(service.has_permission(id, "work_orders.view").await, Ok(true)));
    assert!(matches!(service.has_permission(id, "work_orders.close").await, Ok(false)));
    assert!(matches!(service.has_permission(id, "no.such_key").await, Ok(false)));
}

#[tokio::test]
async fn unknown_principal_is_denied_not_errored() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let service = &harness.authorization;
    let stranger = PrincipalId::new();

    assert!(matches!(service.has_permission(stranger, "customers.view").await, Ok(false)));
    assert!(matches!(
        service.authorize(stranger, TenantId::new(), "customers.view").await,
        Ok(AccessDecision::Denied(DenialReason::UnknownPrincipal))
    ));
    assert!(matches!(
        service.require_permission(stranger, "customers.view").await,
        Err(AppError::Forbidden(message)) if message == "not permitted"
    ));
}

#[tokio::test]
async fn has_any_permission_requires_a_non_empty_list() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let principal = harness.store.add_principal(TenantId::new()).await;
    harness.store.assign(principal, "admin", None).await;
    let id = principal.principal_id();
    let service = &harness.authorization;

    assert!(matches!(service.has_any_permission(id, &[]).await, Ok(false)));
    assert!(matches!(
        service
            .has_any_permission(id, &["no.such_key", "invoices.void"])
            .await,
        Ok(true)
    ));
}

#[tokio::test]
async fn admin_of_one_tenant_is_denied_in_another() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let own_tenant = TenantId::new();
    let principal = harness.store.add_principal(own_tenant).await;
    harness.store.assign(principal, "admin", None).await;
    let id = principal.principal_id();
    let service = &harness.authorization;

    assert!(matches!(service.has_permission(id, "invoices.update").await, Ok(true)));
    assert!(matches!(
        service.authorize(id, TenantId::new(), "invoices.update").await,
        Ok(AccessDecision::Denied(DenialReason::TenantMismatch))
    ));
    assert!(matches!(
        service.authorize(id, own_tenant, "invoices.update").await,
        Ok(AccessDecision::Allowed)
    ));
    assert!(
        service
            .require_access(id, TenantId::new(), "invoices.update")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn same_tenant_without_permission_is_denied() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let principal = harness.store.add_principal(tenant_id).await;

    let decision = harness
        .authorization
        .authorize(principal.principal_id(), tenant_id, "payroll.view")
        .await;

    assert!(matches!(
        decision,
        Ok(AccessDecision::Denied(DenialReason::MissingPermission))
    ));
}

#[tokio::test]
async fn receptionist_scenario_combines_roles_and_overrides() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let principal = harness.store.add_principal(tenant_id).await;
    harness
        .store
        .add_role(
            tenant_id,
            "receptionist",
            &["customers.view", "customers.create"],
        )
        .await;
    harness.store.assign(principal, "receptionist", None).await;
    let id = principal.principal_id();
    let service = &harness.authorization;

    harness
        .store
        .put_override(principal, "invoices.view", true, None)
        .await;
    service.cache().invalidate(id).await;
    let Ok(permissions) = service.effective_permissions(id).await else {
        panic!("expected permissions");
    };
    assert_eq!(
        permissions,
        vec![
            key("customers.create"),
            key("customers.view"),
            key("invoices.view")
        ]
    );

    harness
        .store
        .put_override(principal, "customers.create", false, None)
        .await;
    service.cache().invalidate(id).await;
    let Ok(permissions) = service.effective_permissions(id).await else {
        panic!("expected permissions");
    };
    assert_eq!(permissions, vec![key("customers.view"), key("invoices.view")]);
}

#[tokio::test]
async fn resolve_direct_sees_writes_the_cache_has_not_seen() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let principal = harness.store.add_principal(TenantId::new()).await;
    let id = principal.principal_id();
    let service = &harness.authorization;

    assert!(matches!(service.has_permission(id, "reports.view").await, Ok(false)));
    harness
        .store
        .put_override(principal, "reports.view", true, None)
        .await;

    assert!(matches!(service.has_permission(id, "reports.view").await, Ok(false)));
    assert!(matches!(
        service.resolve_direct(id).await,
        Ok(ref permissions) if permissions.allows("reports.view")
    ));
    assert!(matches!(
        service.explain(id, "reports.view").await,
        Ok(decision) if decision.allowed && decision.source == Some(PermissionSource::Granted)
    ));
}

#[tokio::test]
async fn principal_tenant_reports_unknown_principals() {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let principal = harness.store.add_principal(tenant_id).await;
    let service = &harness.authorization;

    assert!(matches!(
        service.principal_tenant(principal.principal_id()).await,
        Ok(value) if value == tenant_id
    ));
    assert!(matches!(
        service.principal_tenant(PrincipalId::new()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn warm_checks_are_answered_without_a_tenant_lookup() {
    use std::sync::atomic::Ordering;

    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let principal = harness.store.add_principal(tenant_id).await;
    harness
        .store
        .put_override(principal, "invoices.view", true, None)
        .await;
    let service = &harness.authorization;
    let id = principal.principal_id();

    assert!(matches!(service.has_permission(id, "invoices.view").await, Ok(true)));
    let warmed = harness.store.tenant_lookups.load(Ordering::SeqCst);

    assert!(matches!(service.has_permission(id, "invoices.view").await, Ok(true)));
    assert!(matches!(
        service
            .has_any_permission(id, &["payroll.view", "invoices.view"])
            .await,
        Ok(true)
    ));
    assert!(matches!(
        service.authorize(id, tenant_id, "invoices.view").await,
        Ok(AccessDecision::Allowed)
    ));
    assert!(matches!(
        service.authorize(id, TenantId::new(), "invoices.view").await,
        Ok(AccessDecision::Denied(DenialReason::TenantMismatch))
    ));
    assert_eq!(harness.store.tenant_lookups.load(Ordering::SeqCst), warmed);

    service.cache().invalidate(id).await;
    assert!(matches!(service.has_permission(id, "invoices.view").await, Ok(true)));
    assert!(harness.store.tenant_lookups.load(Ordering::SeqCst) > warmed);
}
