use keystone_core::AppResult;
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::redis::build_redis_client;

mod caches;
mod repositories;
mod security;

pub use repositories::RepositorySet;

/// Wires services over Postgres when a pool is given, otherwise over the
/// process-local store.
pub fn build_app_state(
    pool: Option<PgPool>,
    config: &ApiConfig,
) -> AppResult<(AppState, RepositorySet)> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let repositories = match pool.as_ref() {
        Some(pool) => repositories::build_postgres_repository_set(pool),
        None => repositories::build_in_memory_repository_set(),
    };
    let cache_store = caches::build_permission_cache_store(config, pool.as_ref(), redis_client)?;
    let services = security::build_security_services(&repositories, cache_store, config);

    Ok((
        AppState {
            authorization_service: services.authorization_service,
            security_admin_service: services.security_admin_service,
        },
        repositories,
    ))
}
