use chrono::{DateTime, Utc};
use keystone_application::AuditLogEntry;
use keystone_core::{AppError, AppResult};
use keystone_domain::{PermissionDefinition, PermissionOverride, RoleAssignment, RoleDefinition};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for catalog registration.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/register-permission-request.ts"
)]
pub struct RegisterPermissionRequest {
    pub key: String,
    pub description: Option<String>,
}

/// Incoming payload for catalog activation changes.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/set-permission-active-request.ts"
)]
pub struct SetPermissionActiveRequest {
    pub is_active: bool,
}

/// Incoming payload for tenant role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub principal_id: String,
    pub role_key: String,
    /// RFC 3339 timestamp.
    pub expires_at: Option<String>,
}

/// Incoming payload for role revocation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/revoke-role-request.ts"
)]
pub struct RevokeRoleRequest {
    pub principal_id: String,
    pub role_key: String,
}

/// Incoming payload for writing a grant or revoke override.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/set-override-request.ts"
)]
pub struct SetOverrideRequest {
    pub is_granted: bool,
    pub reason: String,
    /// RFC 3339 timestamp.
    pub expires_at: Option<String>,
}

/// API representation of a catalog permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    pub key: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub tenant_id: Option<String>,
    pub key: String,
    pub display_name: String,
    pub is_system: bool,
    pub is_active: bool,
    pub permissions: Vec<String>,
}

/// API representation of a role assignment.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-assignment-response.ts"
)]
pub struct RoleAssignmentResponse {
    pub principal_id: String,
    pub role_id: String,
    pub role_key: String,
    pub assigned_at: String,
    pub expires_at: Option<String>,
    pub assigned_by: Option<String>,
}

/// API representation of a permission override.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/override-response.ts"
)]
pub struct OverrideResponse {
    pub principal_id: String,
    pub permission: String,
    pub is_granted: bool,
    pub reason: String,
    pub expires_at: Option<String>,
    pub granted_by: String,
    pub updated_at: String,
}

/// API representation of an audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub event_id: String,
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: Option<String>,
    pub created_at: String,
}

/// Result of a forced cache rebuild.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/cache-rebuild-response.ts"
)]
pub struct CacheRebuildResponse {
    pub rebuilt_principals: u32,
}

/// Parses an optional RFC 3339 timestamp from a request body.
pub fn parse_optional_timestamp(
    field: &str,
    value: Option<&str>,
) -> AppResult<Option<DateTime<Utc>>> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            DateTime::parse_from_rfc3339(value.trim())
                .map(|timestamp| timestamp.with_timezone(&Utc))
                .map_err(|error| {
                    AppError::Validation(format!("{field} must be an RFC 3339 timestamp: {error}"))
                })
        })
        .transpose()
}

impl From<PermissionDefinition> for PermissionResponse {
    fn from(value: PermissionDefinition) -> Self {
        Self {
            key: value.key().as_str().to_owned(),
            resource: value.resource().to_owned(),
            action: value.action().to_owned(),
            description: value.description().map(ToOwned::to_owned),
            is_active: value.is_active(),
        }
    }
}

impl From<RoleDefinition> for RoleResponse {
    fn from(value: RoleDefinition) -> Self {
        Self {
            role_id: value.role_id.to_string(),
            tenant_id: value.tenant_id.map(|tenant_id| tenant_id.to_string()),
            key: value.key.as_str().to_owned(),
            display_name: value.display_name,
            is_system: value.is_system,
            is_active: value.is_active,
            permissions: value.permissions.into_iter().map(String::from).collect(),
        }
    }
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(value: RoleAssignment) -> Self {
        Self {
            principal_id: value.principal_id.to_string(),
            role_id: value.role_id.to_string(),
            role_key: value.role_key.as_str().to_owned(),
            assigned_at: value.assigned_at.to_rfc3339(),
            expires_at: value.expires_at.map(|expires_at| expires_at.to_rfc3339()),
            assigned_by: value.assigned_by.map(|actor_id| actor_id.to_string()),
        }
    }
}

impl From<PermissionOverride> for OverrideResponse {
    fn from(value: PermissionOverride) -> Self {
        Self {
            principal_id: value.principal_id.to_string(),
            permission: value.permission_key.into(),
            is_granted: value.is_granted,
            reason: value.reason,
            expires_at: value.expires_at.map(|expires_at| expires_at.to_rfc3339()),
            granted_by: value.granted_by.to_string(),
            updated_at: value.updated_at.to_rfc3339(),
        }
    }
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            event_id: value.event_id.to_string(),
            actor_id: value.actor_id.to_string(),
            action: value.action,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            detail: value.detail,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}
