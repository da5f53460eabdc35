use chrono::Utc;
use keystone_application::{AssignRoleInput, CreateRoleInput};
use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{PermissionKey, RoleAssignment, RoleKey};
use tracing::info;
use uuid::Uuid;

use crate::api_services::RepositorySet;
use crate::state::AppState;

pub(crate) const DEV_SEED_TENANT_ID: Uuid =
    Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
const DEV_SEED_TENANT_NAME: &str = "Northwind Service Center";
pub(crate) const DEV_SEED_ADMIN_ID: Uuid =
    Uuid::from_u128(0xa2c8_ea5f_4f39_4724_97f5_932f_97f5_4f76);
const DEV_SEED_ADMIN_DISPLAY_NAME: &str = "Tenant Admin";
pub(crate) const DEV_SEED_ADVISOR_ID: Uuid =
    Uuid::from_u128(0x96d1_1e90_7403_4654_9727_cb10_43f8_bd31);
const DEV_SEED_ADVISOR_DISPLAY_NAME: &str = "Service Advisor";
const DEV_SEED_ADVISOR_ROLE: &str = "service_advisor";
const DEV_SEED_ADVISOR_PERMISSIONS: &[&str] = &[
    "customers.view",
    "customers.create",
    "vehicles.view",
    "work_orders.view",
    "work_orders.create",
    "invoices.view",
];

/// Provisions a demo tenant with one administrator and one service advisor.
///
/// Safe to run repeatedly.
pub async fn run(state: &AppState, repositories: &RepositorySet) -> AppResult<()> {
    let tenant_id = TenantId::from_uuid(DEV_SEED_TENANT_ID);
    let admin = PrincipalIdentity::new(PrincipalId::from_uuid(DEV_SEED_ADMIN_ID), tenant_id);
    let advisor = PrincipalIdentity::new(PrincipalId::from_uuid(DEV_SEED_ADVISOR_ID), tenant_id);

    let directory = &repositories.principal_directory;
    directory
        .ensure_tenant(tenant_id, DEV_SEED_TENANT_NAME)
        .await?;
    directory
        .register_principal(admin, DEV_SEED_ADMIN_DISPLAY_NAME)
        .await?;
    directory
        .register_principal(advisor, DEV_SEED_ADVISOR_DISPLAY_NAME)
        .await?;

    bootstrap_admin(state, repositories, admin).await?;

    let advisor_role = RoleKey::new(DEV_SEED_ADVISOR_ROLE)?;
    let existing_role = repositories
        .security_admin_repository
        .find_role(tenant_id, &advisor_role)
        .await?;
    if existing_role.is_none() {
        let permissions = DEV_SEED_ADVISOR_PERMISSIONS
            .iter()
            .map(|key| PermissionKey::new(*key))
            .collect::<AppResult<Vec<_>>>()?;
        state
            .security_admin_service
            .create_role(
                &admin,
                CreateRoleInput {
                    key: advisor_role.clone(),
                    display_name: DEV_SEED_ADVISOR_DISPLAY_NAME.to_owned(),
                    permissions,
                },
            )
            .await?;
    }

    if !has_assignment(repositories, advisor, &advisor_role).await? {
        state
            .security_admin_service
            .assign_role(
                &admin,
                AssignRoleInput {
                    principal_id: advisor.principal_id(),
                    role_key: advisor_role,
                    expires_at: None,
                },
            )
            .await?;
    }

    info!(
        tenant_id = %tenant_id,
        admin_id = %admin.principal_id(),
        advisor_id = %advisor.principal_id(),
        "dev seed applied"
    );
    Ok(())
}

/// Writes the first admin assignment straight through the repository, since
/// no principal can hold `security.roles.manage` before it exists.
async fn bootstrap_admin(
    state: &AppState,
    repositories: &RepositorySet,
    admin: PrincipalIdentity,
) -> AppResult<()> {
    let admin_role_key = RoleKey::admin();
    if has_assignment(repositories, admin, &admin_role_key).await? {
        return Ok(());
    }

    let admin_role = repositories
        .security_admin_repository
        .find_role(admin.tenant_id(), &admin_role_key)
        .await?
        .ok_or_else(|| AppError::NotFound("system role 'admin' is not seeded".to_owned()))?;

    repositories
        .security_admin_repository
        .assign_role(RoleAssignment {
            principal_id: admin.principal_id(),
            tenant_id: admin.tenant_id(),
            role_id: admin_role.role_id,
            role_key: admin_role.key,
            assigned_at: Utc::now(),
            expires_at: None,
            assigned_by: None,
        })
        .await?;

    state
        .authorization_service
        .cache()
        .invalidate(admin.principal_id())
        .await;
    Ok(())
}

async fn has_assignment(
    repositories: &RepositorySet,
    principal: PrincipalIdentity,
    role_key: &RoleKey,
) -> AppResult<bool> {
    Ok(repositories
        .security_admin_repository
        .list_role_assignments(principal.tenant_id())
        .await?
        .iter()
        .any(|assignment| {
            assignment.principal_id == principal.principal_id() && &assignment.role_key == role_key
        }))
}
