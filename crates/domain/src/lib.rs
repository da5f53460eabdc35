//! Domain entities, invariants and the effective permission resolver.

#![forbid(unsafe_code)]

mod permission;
mod permission_override;
mod resolution;
mod role;
mod security;

pub use permission::{PermissionDefinition, PermissionKey, default_permission_catalog};
pub use permission_override::PermissionOverride;
pub use resolution::{
    AdminStatus, EffectivePermissions, PermissionDecision, PermissionModel, PermissionSource,
    ResolutionInput, RoleGrant, resolve_effective_permissions,
};
pub use role::{ADMIN_ROLE_KEY, RoleAssignment, RoleDefinition, RoleId, RoleKey};
pub use security::{AuditAction, SecurityPermission};
