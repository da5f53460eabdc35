use std::sync::Arc;

use keystone_application::PermissionCacheStore;
use keystone_core::{AppError, AppResult};
use keystone_infrastructure::{
    InMemoryPermissionCache, PostgresPermissionCache, RedisPermissionCache,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, CacheBackend};

pub(super) fn build_permission_cache_store(
    config: &ApiConfig,
    pool: Option<&PgPool>,
    redis_client: Option<redis::Client>,
) -> AppResult<Arc<dyn PermissionCacheStore>> {
    match config.cache_backend {
        CacheBackend::InMemory => Ok(Arc::new(InMemoryPermissionCache::new())),
        CacheBackend::Redis => {
            let redis_client = redis_client.ok_or_else(|| {
                AppError::Validation(
                    "REDIS_URL is required when PERMISSION_CACHE_BACKEND=redis".to_owned(),
                )
            })?;
            Ok(Arc::new(RedisPermissionCache::new(
                redis_client,
                "keystone:permissions",
            )))
        }
        CacheBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Validation(
                    "DATABASE_URL is required when PERMISSION_CACHE_BACKEND=postgres".to_owned(),
                )
            })?;
            Ok(Arc::new(PostgresPermissionCache::new(pool.clone())))
        }
    }
}
