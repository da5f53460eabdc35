//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_log;
mod in_memory_authorization_store;
mod in_memory_permission_cache;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod postgres_errors;
mod postgres_permission_cache;
mod postgres_principal_directory;
mod postgres_rows;
mod postgres_security_admin_repository;
mod redis_permission_cache;

#[cfg(test)]
mod postgres_test_support;

pub use in_memory_audit_log::InMemoryAuditLog;
pub use in_memory_authorization_store::InMemoryAuthorizationStore;
pub use in_memory_permission_cache::InMemoryPermissionCache;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_permission_cache::PostgresPermissionCache;
pub use postgres_principal_directory::PostgresPrincipalDirectory;
pub use postgres_security_admin_repository::PostgresSecurityAdminRepository;
pub use redis_permission_cache::RedisPermissionCache;
