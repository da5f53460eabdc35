use chrono::{DateTime, Utc};
use keystone_core::PrincipalId;
use keystone_domain::{PermissionKey, RoleKey};

/// Input payload for adding a permission to the global catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPermissionInput {
    /// Permission key in `resource.action` form.
    pub key: PermissionKey,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// Input payload for creating tenant roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role key in tenant scope.
    pub key: RoleKey,
    /// Human-readable name.
    pub display_name: String,
    /// Permissions attached on creation.
    pub permissions: Vec<PermissionKey>,
}

/// Input payload for assigning a role to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// Principal receiving the role.
    pub principal_id: PrincipalId,
    /// Role key visible in the actor's tenant.
    pub role_key: RoleKey,
    /// Optional end of the assignment window.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input payload for writing a permission override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOverrideInput {
    /// Principal the override applies to.
    pub principal_id: PrincipalId,
    /// Overridden permission.
    pub permission_key: PermissionKey,
    /// `true` grants, `false` revokes.
    pub is_granted: bool,
    /// Mandatory justification.
    pub reason: String,
    /// Optional expiry, which must lie in the future.
    pub expires_at: Option<DateTime<Utc>>,
}
