use std::sync::Arc;

use keystone_application::{
    AuditLogRepository, AuditRepository, AuthorizationRepository, PrincipalDirectory,
    SecurityAdminRepository,
};
use keystone_infrastructure::{
    InMemoryAuditLog, InMemoryAuthorizationStore, PostgresAuditLogRepository,
    PostgresAuditRepository, PostgresAuthorizationRepository, PostgresPrincipalDirectory,
    PostgresSecurityAdminRepository,
};
use sqlx::PgPool;

/// Ports backing one deployment, all over the same store.
#[derive(Clone)]
pub struct RepositorySet {
    pub authorization_repository: Arc<dyn AuthorizationRepository>,
    pub security_admin_repository: Arc<dyn SecurityAdminRepository>,
    pub principal_directory: Arc<dyn PrincipalDirectory>,
    pub audit_repository: Arc<dyn AuditRepository>,
    pub audit_log_repository: Arc<dyn AuditLogRepository>,
}

pub(super) fn build_postgres_repository_set(pool: &PgPool) -> RepositorySet {
    RepositorySet {
        authorization_repository: Arc::new(PostgresAuthorizationRepository::new(pool.clone())),
        security_admin_repository: Arc::new(PostgresSecurityAdminRepository::new(pool.clone())),
        principal_directory: Arc::new(PostgresPrincipalDirectory::new(pool.clone())),
        audit_repository: Arc::new(PostgresAuditRepository::new(pool.clone())),
        audit_log_repository: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
    }
}

pub(super) fn build_in_memory_repository_set() -> RepositorySet {
    let store = Arc::new(InMemoryAuthorizationStore::new());
    let audit_log = Arc::new(InMemoryAuditLog::new());

    RepositorySet {
        authorization_repository: store.clone(),
        security_admin_repository: store.clone(),
        principal_directory: store,
        audit_repository: audit_log.clone(),
        audit_log_repository: audit_log,
    }
}
