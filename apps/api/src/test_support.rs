use keystone_core::{PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::PermissionModel;

use crate::api_config::{ApiConfig, CacheBackend};
use crate::api_services::{RepositorySet, build_app_state};
use crate::dev_seed::{self, DEV_SEED_ADMIN_ID, DEV_SEED_ADVISOR_ID, DEV_SEED_TENANT_ID};
use crate::state::AppState;

pub(crate) fn in_memory_config() -> ApiConfig {
    ApiConfig {
        migrate_only: false,
        database_url: None,
        api_host: "127.0.0.1".to_owned(),
        api_port: 0,
        permission_model: PermissionModel::RolesAndOverrides,
        cache_backend: CacheBackend::InMemory,
        redis_url: None,
        cache_max_staleness_seconds: 60,
        resolve_max_attempts: 3,
        dev_seed: true,
    }
}

/// In-memory services with the dev seed applied.
pub(crate) async fn seeded_state() -> (AppState, RepositorySet) {
    let (state, repositories) = match build_app_state(None, &in_memory_config()) {
        Ok(built) => built,
        Err(error) => panic!("in-memory state should build: {error}"),
    };

    if let Err(error) = dev_seed::run(&state, &repositories).await {
        panic!("dev seed should apply: {error}");
    }

    (state, repositories)
}

pub(crate) fn seed_tenant() -> TenantId {
    TenantId::from_uuid(DEV_SEED_TENANT_ID)
}

pub(crate) fn seed_admin() -> PrincipalIdentity {
    PrincipalIdentity::new(PrincipalId::from_uuid(DEV_SEED_ADMIN_ID), seed_tenant())
}

pub(crate) fn seed_advisor() -> PrincipalIdentity {
    PrincipalIdentity::new(PrincipalId::from_uuid(DEV_SEED_ADVISOR_ID), seed_tenant())
}

/// Registers a fresh principal, creating its tenant when needed.
pub(crate) async fn register_principal(
    repositories: &RepositorySet,
    tenant_id: TenantId,
) -> PrincipalIdentity {
    let principal = PrincipalIdentity::new(PrincipalId::new(), tenant_id);
    let directory = &repositories.principal_directory;

    if let Err(error) = directory.ensure_tenant(tenant_id, "Test Tenant").await {
        panic!("tenant should be created: {error}");
    }
    if let Err(error) = directory.register_principal(principal, "Test Principal").await {
        panic!("principal should be registered: {error}");
    }

    principal
}
