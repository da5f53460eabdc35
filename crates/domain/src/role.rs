//! Role catalog and role assignment types.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keystone_core::{AppError, AppResult, PrincipalId, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PermissionKey;

/// Reserved key of the administrator role.
pub const ADMIN_ROLE_KEY: &str = "admin";

/// Unique identifier for a role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Role key, unique per tenant (e.g. `admin`, `receptionist`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleKey(String);

impl RoleKey {
    /// Creates a validated role key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() || trimmed.len() > 64 {
            return Err(AppError::Validation(
                "role key must contain between 1 and 64 characters".to_owned(),
            ));
        }

        let is_valid = trimmed.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        });
        if !is_valid {
            return Err(AppError::Validation(format!(
                "role key '{trimmed}' must only contain lowercase [a-z0-9_]"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the reserved administrator role key.
    #[must_use]
    pub fn admin() -> Self {
        Self(ADMIN_ROLE_KEY.to_owned())
    }

    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether this is the reserved administrator key.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROLE_KEY
    }
}

impl Display for RoleKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl FromStr for RoleKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for RoleKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleKey> for String {
    fn from(value: RoleKey) -> Self {
        value.0
    }
}

/// Named bundle of permissions, owned by a tenant or by the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: RoleId,
    /// Owning tenant; `None` for system roles visible to every tenant.
    pub tenant_id: Option<TenantId>,
    /// Unique role key in tenant scope.
    pub key: RoleKey,
    /// Human-readable name.
    pub display_name: String,
    /// Indicates a system-managed role.
    pub is_system: bool,
    /// Deactivated roles contribute nothing, even while assigned.
    pub is_active: bool,
    /// Permissions attached through the role-permission join.
    pub permissions: Vec<PermissionKey>,
}

impl RoleDefinition {
    /// Returns whether the role is visible inside the given tenant.
    #[must_use]
    pub fn is_visible_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id.is_none_or(|owner| owner == tenant_id)
    }
}

/// Assignment of a role to a principal, optionally time-bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Principal holding the role.
    pub principal_id: PrincipalId,
    /// Tenant the principal belongs to.
    pub tenant_id: TenantId,
    /// Assigned role identifier.
    pub role_id: RoleId,
    /// Assigned role key.
    pub role_key: RoleKey,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Optional end of the assignment window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator that created the assignment.
    pub assigned_by: Option<PrincipalId>,
}

impl RoleAssignment {
    /// Returns whether the assignment window is open at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
