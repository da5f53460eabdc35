use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use keystone_application::{
    AssignRoleInput, AuditLogQuery, CreateRoleInput, RegisterPermissionInput, SetOverrideInput,
};
use keystone_core::{PrincipalId, PrincipalIdentity};
use keystone_domain::{PermissionKey, RoleKey};

use crate::dto::{
    AssignRoleRequest, AuditLogEntryResponse, CacheRebuildResponse, CreateRoleRequest,
    OverrideResponse, PermissionResponse, RegisterPermissionRequest, RevokeRoleRequest,
    RoleAssignmentResponse, RoleResponse, SetOverrideRequest, SetPermissionActiveRequest,
    parse_optional_timestamp,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod assignments;
mod audit;
mod catalog;
mod operations;
mod overrides;
mod roles;

pub use assignments::{assign_role_handler, list_role_assignments_handler, revoke_role_handler};
pub use audit::list_audit_log_handler;
pub use catalog::{
    list_permissions_handler, register_permission_handler, set_permission_active_handler,
};
pub use operations::{force_cache_rebuild_handler, remove_principal_handler};
pub use overrides::{clear_override_handler, list_overrides_handler, set_override_handler};
pub use roles::{
    activate_role_handler, attach_role_permission_handler, create_role_handler,
    deactivate_role_handler, detach_role_permission_handler, list_roles_handler,
};
