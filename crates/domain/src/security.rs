use std::str::FromStr;

use keystone_core::AppError;
use serde::{Deserialize, Serialize};

use crate::PermissionKey;

/// Catalog permissions guarding the security administration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPermission {
    /// Allows registering and (de)activating catalog permissions.
    PermissionsManage,
    /// Allows managing roles, role permissions and role assignments.
    RolesManage,
    /// Allows writing and clearing per-principal overrides.
    OverridesManage,
    /// Allows forcing cache rebuilds.
    CacheManage,
    /// Allows reading the security audit log.
    AuditRead,
}

impl SecurityPermission {
    /// Returns the catalog key for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionsManage => "security.permissions.manage",
            Self::RolesManage => "security.roles.manage",
            Self::OverridesManage => "security.overrides.manage",
            Self::CacheManage => "security.cache.manage",
            Self::AuditRead => "security.audit.read",
        }
    }

    /// Returns all security permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[SecurityPermission] = &[
            SecurityPermission::PermissionsManage,
            SecurityPermission::RolesManage,
            SecurityPermission::OverridesManage,
            SecurityPermission::CacheManage,
            SecurityPermission::AuditRead,
        ];

        ALL
    }

    /// Returns the permission as a validated catalog key.
    pub fn key(&self) -> Result<PermissionKey, AppError> {
        PermissionKey::new(self.as_str())
    }
}

impl FromStr for SecurityPermission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| {
                AppError::Validation(format!("unknown security permission '{value}'"))
            })
    }
}

/// Stable audit actions emitted by security administration use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a permission is added to the catalog.
    PermissionRegistered,
    /// Emitted when a catalog permission is activated or deactivated.
    PermissionActivationChanged,
    /// Emitted when a tenant role is created.
    RoleCreated,
    /// Emitted when a role is deactivated.
    RoleDeactivated,
    /// Emitted when a role is reactivated.
    RoleReactivated,
    /// Emitted when a permission is attached to a role.
    RolePermissionAttached,
    /// Emitted when a permission is detached from a role.
    RolePermissionDetached,
    /// Emitted when a role is assigned to a principal.
    RoleAssigned,
    /// Emitted when a role is removed from a principal.
    RoleUnassigned,
    /// Emitted when an override is written.
    OverrideSet,
    /// Emitted when an override is cleared.
    OverrideCleared,
    /// Emitted when a principal and its security rows are removed.
    PrincipalRemoved,
    /// Emitted when an administrator forces a cache rebuild.
    CacheRebuilt,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionRegistered => "security.permission.registered",
            Self::PermissionActivationChanged => "security.permission.activation_changed",
            Self::RoleCreated => "security.role.created",
            Self::RoleDeactivated => "security.role.deactivated",
            Self::RoleReactivated => "security.role.reactivated",
            Self::RolePermissionAttached => "security.role.permission_attached",
            Self::RolePermissionDetached => "security.role.permission_detached",
            Self::RoleAssigned => "security.role.assigned",
            Self::RoleUnassigned => "security.role.unassigned",
            Self::OverrideSet => "security.override.set",
            Self::OverrideCleared => "security.override.cleared",
            Self::PrincipalRemoved => "security.principal.removed",
            Self::CacheRebuilt => "security.cache.rebuilt",
        }
    }
}
