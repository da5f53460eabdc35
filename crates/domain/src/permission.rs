//! Global permission catalog types.

use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use keystone_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Stable capability key in `resource.action` form, e.g. `invoices.update`.
///
/// The action is the segment after the last dot; everything before it is the
/// resource, so `security.roles.manage` has resource `security.roles`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Creates a validated permission key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.len() > 128 {
            return Err(AppError::Validation(format!(
                "permission key '{trimmed}' must not exceed 128 characters"
            )));
        }

        if !trimmed.contains('.') {
            return Err(AppError::Validation(format!(
                "permission key '{trimmed}' must have the form 'resource.action'"
            )));
        }

        for segment in trimmed.split('.') {
            let is_valid = !segment.is_empty() && segment.chars().all(is_key_character);
            if !is_valid {
                return Err(AppError::Validation(format!(
                    "permission key '{trimmed}' segments must be non-empty lowercase [a-z0-9_]"
                )));
            }
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the resource part of the key.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(resource, _)| resource)
            .unwrap_or(self.0.as_str())
    }

    /// Returns the action part of the key.
    #[must_use]
    pub fn action(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(_, action)| action)
            .unwrap_or(self.0.as_str())
    }
}

fn is_key_character(character: char) -> bool {
    character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
}

impl Borrow<str> for PermissionKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionKey> for String {
    fn from(value: PermissionKey) -> Self {
        value.0
    }
}

/// Catalog entry for one permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    key: PermissionKey,
    description: Option<String>,
    is_active: bool,
}

impl PermissionDefinition {
    /// Creates an active catalog entry.
    #[must_use]
    pub fn new(key: PermissionKey, description: Option<String>) -> Self {
        Self {
            key,
            description: description.filter(|value| !value.trim().is_empty()),
            is_active: true,
        }
    }

    /// Rebuilds a catalog entry from storage.
    #[must_use]
    pub fn from_storage(key: PermissionKey, description: Option<String>, is_active: bool) -> Self {
        Self {
            key,
            description,
            is_active,
        }
    }

    /// Returns the permission key.
    #[must_use]
    pub fn key(&self) -> &PermissionKey {
        &self.key
    }

    /// Returns the resource part of the key.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.key.resource()
    }

    /// Returns the action part of the key.
    #[must_use]
    pub fn action(&self) -> &str {
        self.key.action()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether the permission may currently be granted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns a copy with the activation flag changed.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

const DEFAULT_CATALOG: &[(&str, &str)] = &[
    ("customers.view", "View customers"),
    ("customers.create", "Create customers"),
    ("customers.update", "Update customers"),
    ("customers.delete", "Delete customers"),
    ("vehicles.view", "View vehicles"),
    ("vehicles.create", "Register vehicles"),
    ("vehicles.update", "Update vehicles"),
    ("vehicles.delete", "Delete vehicles"),
    ("work_orders.view", "View work orders"),
    ("work_orders.create", "Open work orders"),
    ("work_orders.update", "Update work orders"),
    ("work_orders.close", "Close work orders"),
    ("invoices.view", "View invoices"),
    ("invoices.create", "Issue invoices"),
    ("invoices.update", "Update invoices"),
    ("invoices.void", "Void invoices"),
    ("inventory.view", "View inventory"),
    ("inventory.adjust", "Adjust stock levels"),
    ("payroll.view", "View payroll"),
    ("payroll.manage", "Run and edit payroll"),
    ("reports.view", "View dashboards and reports"),
    ("security.permissions.manage", "Manage the permission catalog"),
    ("security.roles.manage", "Manage roles and role assignments"),
    ("security.overrides.manage", "Manage per-principal permission overrides"),
    ("security.cache.manage", "Force permission cache rebuilds"),
    ("security.audit.read", "Read the security audit log"),
];

/// Returns the catalog seeded into fresh deployments.
#[must_use]
pub fn default_permission_catalog() -> Vec<PermissionDefinition> {
    DEFAULT_CATALOG
        .iter()
        .filter_map(|(key, description)| {
            PermissionKey::new(*key)
                .ok()
                .map(|key| PermissionDefinition::new(key, Some((*description).to_owned())))
        })
        .collect()
}
