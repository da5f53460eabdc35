mod authz;
mod common;
mod security;

pub use authz::{
    AccessCheckRequest, AccessDecisionResponse, AnyPermissionCheckRequest,
    EffectivePermissionsResponse, PermissionCheckRequest, PermissionExplanationResponse,
    PrincipalTenantResponse,
};
pub use common::HealthResponse;
pub use security::{
    AssignRoleRequest, AuditLogEntryResponse, CacheRebuildResponse, CreateRoleRequest,
    OverrideResponse, PermissionResponse, RegisterPermissionRequest, RevokeRoleRequest,
    RoleAssignmentResponse, RoleResponse, SetOverrideRequest, SetPermissionActiveRequest,
    parse_optional_timestamp,
};
