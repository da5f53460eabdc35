use chrono::{Duration, Utc};
use keystone_core::{AppError, PrincipalIdentity, TenantId};
use keystone_domain::{AuditAction, PermissionModel};

use crate::test_support::{Harness, key, role_key};
use crate::{
    AssignRoleInput, AuditLogQuery, CreateRoleInput, RegisterPermissionInput, SetOverrideInput,
};

struct Fixture {
    harness: Harness,
    tenant_id: TenantId,
    admin: PrincipalIdentity,
    staff: PrincipalIdentity,
}

async fn fixture() -> Fixture {
    let harness = Harness::new(PermissionModel::RolesAndOverrides);
    let tenant_id = TenantId::new();
    let admin = harness.store.add_principal(tenant_id).await;
    harness.store.assign(admin, "admin", None).await;
    let staff = harness.store.add_principal(tenant_id).await;

    Fixture {
        harness,
        tenant_id,
        admin,
        staff,
    }
}

fn grant_input(staff: PrincipalIdentity, permission: &str, is_granted: bool) -> SetOverrideInput {
    SetOverrideInput {
        principal_id: staff.principal_id(),
        permission_key: key(permission),
        is_granted,
        reason: "covering the front desk".to_owned(),
        expires_at: None,
    }
}

#[tokio::test]
async fn mutations_require_management_permission() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();

    let result = service
        .create_role(
            &fixture.staff,
            CreateRoleInput {
                key: role_key("ops"),
                display_name: "Ops".to_owned(),
                permissions: vec![key("customers.view")],
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = service
        .set_override(&fixture.staff, grant_input(fixture.admin, "payroll.view", true))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = service
        .list_audit_log(&fixture.staff, AuditLogQuery::default())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn override_for_principal_in_another_tenant_is_unauthorized() {
    let fixture = fixture().await;
    let outsider = fixture.harness.store.add_principal(TenantId::new()).await;
    let service = fixture.harness.security_admin();

    let result = service
        .set_override(&fixture.admin, grant_input(outsider, "payroll.view", true))
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));

    let result = service
        .assign_role(
            &fixture.admin,
            AssignRoleInput {
                principal_id: outsider.principal_id(),
                role_key: role_key("admin"),
                expires_at: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn set_override_validates_input() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();

    let mut empty_reason = grant_input(fixture.staff, "payroll.view", true);
    empty_reason.reason = "   ".to_owned();
    assert!(matches!(
        service.set_override(&fixture.admin, empty_reason).await,
        Err(AppError::Validation(_))
    ));

    let mut past_expiry = grant_input(fixture.staff, "payroll.view", true);
    past_expiry.expires_at = Some(Utc::now() - Duration::minutes(1));
    assert!(matches!(
        service.set_override(&fixture.admin, past_expiry).await,
        Err(AppError::Validation(_))
    ));

    assert!(matches!(
        service
            .set_override(&fixture.admin, grant_input(fixture.staff, "fleet.track", true))
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn override_write_invalidates_before_returning() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();
    let authorization = &fixture.harness.authorization;
    let staff_id = fixture.staff.principal_id();

    assert!(matches!(authorization.has_permission(staff_id, "payroll.view").await, Ok(false)));

    let stored = service
        .set_override(&fixture.admin, grant_input(fixture.staff, "payroll.view", true))
        .await;
    assert!(matches!(stored, Ok(ref value) if value.granted_by == fixture.admin.principal_id()));
    assert!(matches!(authorization.has_permission(staff_id, "payroll.view").await, Ok(true)));

    let stored = service
        .set_override(&fixture.admin, grant_input(fixture.staff, "payroll.view", false))
        .await;
    assert!(stored.is_ok());
    assert!(matches!(authorization.has_permission(staff_id, "payroll.view").await, Ok(false)));

    let overrides = service.list_overrides(&fixture.admin, staff_id).await;
    assert!(matches!(overrides, Ok(ref values) if values.len() == 1 && !values[0].is_granted));

    assert!(
        service
            .clear_override(&fixture.admin, staff_id, &key("payroll.view"))
            .await
            .is_ok()
    );
    assert!(matches!(
        service
            .clear_override(&fixture.admin, staff_id, &key("payroll.view"))
            .await,
        Err(AppError::NotFound(_))
    ));

    let actions: Vec<AuditAction> = fixture
        .harness
        .audit
        .events
        .lock()
        .await
        .iter()
        .map(|event| event.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::OverrideSet,
            AuditAction::OverrideSet,
            AuditAction::OverrideCleared
        ]
    );
}

#[tokio::test]
async fn deactivating_a_role_twice_equals_deactivating_once() {
    let fixture = fixture().await;
    let store = &fixture.harness.store;
    store
        .add_role(fixture.tenant_id, "cashier", &["invoices.view", "invoices.create"])
        .await;
    store
        .add_role(fixture.tenant_id, "clerk", &["invoices.view"])
        .await;
    store.assign(fixture.staff, "cashier", None).await;
    store.assign(fixture.staff, "clerk", None).await;

    let service = fixture.harness.security_admin();
    let authorization = &fixture.harness.authorization;
    let staff_id = fixture.staff.principal_id();
    assert!(matches!(authorization.has_permission(staff_id, "invoices.create").await, Ok(true)));

    let first = service
        .deactivate_role(&fixture.admin, &role_key("cashier"))
        .await;
    let second = service
        .deactivate_role(&fixture.admin, &role_key("cashier"))
        .await;
    assert!(matches!(first, Ok(ref role) if !role.is_active));
    assert!(matches!(second, Ok(ref role) if !role.is_active));

    assert!(matches!(authorization.has_permission(staff_id, "invoices.create").await, Ok(false)));
    assert!(matches!(authorization.has_permission(staff_id, "invoices.view").await, Ok(true)));

    let deactivations = fixture
        .harness
        .audit
        .events
        .lock()
        .await
        .iter()
        .filter(|event| event.action == AuditAction::RoleDeactivated)
        .count();
    assert_eq!(deactivations, 1);

    assert!(
        service
            .reactivate_role(&fixture.admin, &role_key("cashier"))
            .await
            .is_ok()
    );
    assert!(matches!(authorization.has_permission(staff_id, "invoices.create").await, Ok(true)));
}

#[tokio::test]
async fn system_roles_cannot_be_modified() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();

    assert!(matches!(
        service.deactivate_role(&fixture.admin, &role_key("admin")).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        service
            .attach_permission(&fixture.admin, &role_key("admin"), &key("payroll.view"))
            .await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn attach_and_detach_invalidate_every_holder() {
    let fixture = fixture().await;
    let store = &fixture.harness.store;
    store
        .add_role(fixture.tenant_id, "mechanic", &["work_orders.view"])
        .await;
    store.assign(fixture.staff, "mechanic", None).await;

    let service = fixture.harness.security_admin();
    let authorization = &fixture.harness.authorization;
    let staff_id = fixture.staff.principal_id();
    assert!(matches!(authorization.has_permission(staff_id, "work_orders.close").await, Ok(false)));

    assert!(
        service
            .attach_permission(&fixture.admin, &role_key("mechanic"), &key("work_orders.close"))
            .await
            .is_ok()
    );
    assert!(matches!(authorization.has_permission(staff_id, "work_orders.close").await, Ok(true)));

    assert!(
        service
            .detach_permission(&fixture.admin, &role_key("mechanic"), &key("work_orders.close"))
            .await
            .is_ok()
    );
    assert!(matches!(authorization.has_permission(staff_id, "work_orders.close").await, Ok(false)));
}

#[tokio::test]
async fn attach_rejects_inactive_permissions() {
    let fixture = fixture().await;
    fixture
        .harness
        .store
        .add_role(fixture.tenant_id, "mechanic", &[])
        .await;
    let service = fixture.harness.security_admin();

    assert!(
        service
            .set_permission_active(&fixture.admin, &key("inventory.adjust"), false)
            .await
            .is_ok()
    );
    assert!(matches!(
        service
            .attach_permission(&fixture.admin, &role_key("mechanic"), &key("inventory.adjust"))
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        fixture
            .harness
            .authorization
            .has_permission(fixture.admin.principal_id(), "inventory.adjust")
            .await,
        Ok(false)
    ));
}

#[tokio::test]
async fn create_role_rejects_reserved_key_and_duplicates() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();
    let input = CreateRoleInput {
        key: role_key("service_advisor"),
        display_name: "Service advisor".to_owned(),
        permissions: vec![key("customers.view"), key("work_orders.create")],
    };

    assert!(matches!(
        service.create_role(&fixture.admin, input.clone()).await,
        Ok(ref role) if role.permissions.len() == 2 && role.tenant_id == Some(fixture.tenant_id)
    ));
    assert!(matches!(
        service.create_role(&fixture.admin, input).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        service
            .create_role(
                &fixture.admin,
                CreateRoleInput {
                    key: role_key("admin"),
                    display_name: "Shadow admin".to_owned(),
                    permissions: Vec::new(),
                },
            )
            .await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn assign_and_revoke_role_update_permissions() {
    let fixture = fixture().await;
    fixture
        .harness
        .store
        .add_role(fixture.tenant_id, "accountant", &["payroll.view"])
        .await;
    let service = fixture.harness.security_admin();
    let authorization = &fixture.harness.authorization;
    let staff_id = fixture.staff.principal_id();

    let assigned = service
        .assign_role(
            &fixture.admin,
            AssignRoleInput {
                principal_id: staff_id,
                role_key: role_key("accountant"),
                expires_at: Some(Utc::now() + Duration::days(1)),
            },
        )
        .await;
    assert!(assigned.is_ok());
    assert!(matches!(authorization.has_permission(staff_id, "payroll.view").await, Ok(true)));

    assert!(
        service
            .revoke_role(&fixture.admin, staff_id, &role_key("accountant"))
            .await
            .is_ok()
    );
    assert!(matches!(authorization.has_permission(staff_id, "payroll.view").await, Ok(false)));
    assert!(matches!(
        service
            .revoke_role(&fixture.admin, staff_id, &role_key("accountant"))
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn remove_principal_cascades_and_drops_cache_entry() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();
    let staff_id = fixture.staff.principal_id();
    fixture
        .harness
        .store
        .put_override(fixture.staff, "reports.view", true, None)
        .await;
    assert!(matches!(
        fixture.harness.authorization.has_permission(staff_id, "reports.view").await,
        Ok(true)
    ));

    assert!(service.remove_principal(&fixture.admin, staff_id).await.is_ok());

    assert!(
        !fixture
            .harness
            .cache_store
            .entries
            .lock()
            .await
            .contains_key(&staff_id)
    );
    assert!(matches!(
        fixture.harness.authorization.has_permission(staff_id, "reports.view").await,
        Ok(false)
    ));
    assert!(matches!(
        service
            .remove_principal(&fixture.admin, fixture.admin.principal_id())
            .await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn register_permission_extends_admin_set() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();
    let authorization = &fixture.harness.authorization;
    let admin_id = fixture.admin.principal_id();
    assert!(matches!(authorization.has_permission(admin_id, "fleet.track").await, Ok(false)));

    let registered = service
        .register_permission(
            &fixture.admin,
            RegisterPermissionInput {
                key: key("fleet.track"),
                description: Some("Track fleet vehicles".to_owned()),
            },
        )
        .await;
    assert!(matches!(registered, Ok(ref definition) if definition.is_active()));
    assert!(matches!(authorization.has_permission(admin_id, "fleet.track").await, Ok(true)));

    assert!(matches!(
        service
            .register_permission(
                &fixture.admin,
                RegisterPermissionInput {
                    key: key("fleet.track"),
                    description: None,
                },
            )
            .await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn force_rebuild_and_audit_log_listing() {
    let fixture = fixture().await;
    let service = fixture.harness.security_admin();

    assert!(matches!(service.force_cache_rebuild(&fixture.admin).await, Ok(2)));

    let entries = service
        .list_audit_log(
            &fixture.admin,
            AuditLogQuery {
                limit: 0,
                ..AuditLogQuery::default()
            },
        )
        .await;
    assert!(matches!(
        entries,
        Ok(ref values) if values.len() == 1 && values[0].action == "security.cache.rebuilt"
    ));
}
