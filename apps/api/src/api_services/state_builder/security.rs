use std::sync::Arc;

use chrono::Duration;
use keystone_application::{
    AuthorizationService, PermissionCache, PermissionCacheStore, PermissionResolver,
    SecurityAdminService,
};

use crate::api_config::ApiConfig;

use super::repositories::RepositorySet;

pub(super) struct SecurityServices {
    pub(super) authorization_service: AuthorizationService,
    pub(super) security_admin_service: SecurityAdminService,
}

pub(super) fn build_security_services(
    repositories: &RepositorySet,
    cache_store: Arc<dyn PermissionCacheStore>,
    config: &ApiConfig,
) -> SecurityServices {
    let resolver = PermissionResolver::new(
        repositories.authorization_repository.clone(),
        config.permission_model,
    )
    .with_max_attempts(config.resolve_max_attempts);
    let cache = PermissionCache::new(cache_store, resolver)
        .with_max_staleness(Duration::seconds(config.cache_max_staleness_seconds));

    let authorization_service =
        AuthorizationService::new(repositories.authorization_repository.clone(), cache);

    let security_admin_service = SecurityAdminService::new(
        authorization_service.clone(),
        repositories.security_admin_repository.clone(),
        repositories.audit_log_repository.clone(),
        repositories.audit_repository.clone(),
    );

    SecurityServices {
        authorization_service,
        security_admin_service,
    }
}
