//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod authorization_ports;
mod authorization_service;
mod permission_cache;
mod permission_resolver;
mod principal_directory_ports;
mod security_admin_service;
mod tenant_guard;

#[cfg(test)]
mod test_support;

/// Ports and inputs for security administration.
pub mod security_admin_ports;

pub use audit_ports::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
};
pub use authorization_ports::AuthorizationRepository;
pub use authorization_service::AuthorizationService;
pub use permission_cache::{
    CacheEpoch, CachedPermissions, DEFAULT_MAX_STALENESS_SECONDS, PermissionCache,
    PermissionCacheStore, SnapshotEntry,
};
pub use permission_resolver::PermissionResolver;
pub use principal_directory_ports::PrincipalDirectory;
pub use security_admin_ports::{
    AssignRoleInput, CreateRoleInput, RegisterPermissionInput, SecurityAdminRepository,
    SetOverrideInput,
};
pub use security_admin_service::SecurityAdminService;
pub use tenant_guard::{AccessDecision, DenialReason, TenantGuard};
