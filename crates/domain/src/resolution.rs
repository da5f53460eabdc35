//! Effective permission resolution.
//!
//! Resolution is a pure function over already-loaded data: the catalog, the
//! principal's role grants, and the principal's overrides. Loading that data and
//! caching the result are application concerns.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keystone_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{PermissionDefinition, PermissionKey, PermissionOverride, RoleKey};

/// Policy deciding whether roles contribute permissions.
///
/// Chosen once per deployment and never inferred from stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModel {
    /// Role permissions and grant overrides both contribute.
    RolesAndOverrides,
    /// Roles are labels; only grant overrides contribute.
    ///
    /// The administrator bypass still applies.
    OverridesOnly,
}

impl PermissionModel {
    /// Returns a stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RolesAndOverrides => "roles_and_overrides",
            Self::OverridesOnly => "overrides_only",
        }
    }
}

impl Display for PermissionModel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PermissionModel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "roles_and_overrides" => Ok(Self::RolesAndOverrides),
            "overrides_only" => Ok(Self::OverridesOnly),
            other => Err(AppError::Validation(format!(
                "unknown permission model '{other}', expected 'roles_and_overrides' or 'overrides_only'"
            ))),
        }
    }
}

/// Provenance tag recorded for each resolved permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    /// Granted by the administrator bypass.
    Admin,
    /// Contributed by an active role assignment.
    Role,
    /// Contributed by a grant override.
    Granted,
    /// Suppressed by a revoke override.
    Revoked,
}

impl PermissionSource {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Role => "role",
            Self::Granted => "granted",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for PermissionSource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "role" => Ok(Self::Role),
            "granted" => Ok(Self::Granted),
            "revoked" => Ok(Self::Revoked),
            other => Err(AppError::Validation(format!(
                "unknown permission source '{other}'"
            ))),
        }
    }
}

/// Administrator bypass state for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminStatus {
    /// Not yet looked up; derived from the role grants during resolution.
    Unresolved,
    /// Holds an active assignment to the active `admin` role.
    Admin,
    /// Does not hold the administrator role.
    NonAdmin,
}

impl AdminStatus {
    /// Derives the status directly from assignment and role data.
    ///
    /// This never consults resolved permissions.
    #[must_use]
    pub fn from_role_grants(role_grants: &[RoleGrant], now: DateTime<Utc>) -> Self {
        if role_grants
            .iter()
            .any(|grant| grant.role_key.is_admin() && grant.is_in_force_at(now))
        {
            Self::Admin
        } else {
            Self::NonAdmin
        }
    }

    /// Returns whether the bypass applies.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// One role assignment held by the principal, joined with its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Assigned role key.
    pub role_key: RoleKey,
    /// Whether the role itself is active.
    pub role_is_active: bool,
    /// End of the assignment window, when bounded.
    pub assignment_expires_at: Option<DateTime<Utc>>,
    /// Permissions attached to the role.
    pub permissions: Vec<PermissionKey>,
}

impl RoleGrant {
    /// Returns whether the grant contributes at `now`.
    #[must_use]
    pub fn is_in_force_at(&self, now: DateTime<Utc>) -> bool {
        self.role_is_active
            && self
                .assignment_expires_at
                .is_none_or(|expires_at| expires_at > now)
    }
}

/// Data loaded for one principal before resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionInput<'a> {
    /// Result of the administrator leaf check, when already performed.
    pub admin_status: AdminStatus,
    /// Global permission catalog, including inactive entries.
    pub catalog: &'a [PermissionDefinition],
    /// Role assignments held by the principal.
    pub role_grants: &'a [RoleGrant],
    /// Overrides stored for the principal, including expired rows.
    pub overrides: &'a [PermissionOverride],
}

/// Decision for one permission together with the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    /// Whether the permission is in force.
    pub allowed: bool,
    /// Source that produced the decision; `None` when nothing mentions the key.
    pub source: Option<PermissionSource>,
}

/// Resolved permission set for one principal at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    model: PermissionModel,
    is_admin: bool,
    provenance: BTreeMap<PermissionKey, PermissionSource>,
}

impl EffectivePermissions {
    /// Rebuilds a resolved set from a stored projection.
    #[must_use]
    pub fn from_parts(
        model: PermissionModel,
        is_admin: bool,
        provenance: BTreeMap<PermissionKey, PermissionSource>,
    ) -> Self {
        Self {
            model,
            is_admin,
            provenance,
        }
    }

    /// Returns an empty, deny-everything set.
    #[must_use]
    pub fn empty(model: PermissionModel) -> Self {
        Self::from_parts(model, false, BTreeMap::new())
    }

    /// Returns the model the set was resolved under.
    #[must_use]
    pub fn model(&self) -> PermissionModel {
        self.model
    }

    /// Returns whether the administrator bypass produced this set.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Returns whether the permission is in force.
    #[must_use]
    pub fn allows(&self, permission_key: &str) -> bool {
        self.provenance
            .get(permission_key)
            .is_some_and(|source| *source != PermissionSource::Revoked)
    }

    /// Returns the decision and its source for one permission.
    #[must_use]
    pub fn explain(&self, permission_key: &str) -> PermissionDecision {
        let source = self.provenance.get(permission_key).copied();
        PermissionDecision {
            allowed: source.is_some_and(|source| source != PermissionSource::Revoked),
            source,
        }
    }

    /// Iterates granted permissions in key order.
    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.provenance
            .iter()
            .filter(|(_, source)| **source != PermissionSource::Revoked)
            .map(|(key, _)| key)
    }

    /// Returns granted permissions sorted by key.
    #[must_use]
    pub fn to_sorted_keys(&self) -> Vec<PermissionKey> {
        self.keys().cloned().collect()
    }

    /// Returns the number of granted permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().count()
    }

    /// Returns whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }

    /// Returns provenance for granted and revoked permissions.
    #[must_use]
    pub fn provenance(&self) -> &BTreeMap<PermissionKey, PermissionSource> {
        &self.provenance
    }
}

/// Resolves the effective permission set.
///
/// 1. An in-force `admin` assignment yields the whole active catalog.
/// 2. Otherwise role permissions (under [`PermissionModel::RolesAndOverrides`])
///    and active grant overrides are unioned.
/// 3. Active revoke overrides are subtracted last, so a revoke beats both role
///    grants and a conflicting grant override.
///
/// Inactive catalog entries never appear in the result.
#[must_use]
pub fn resolve_effective_permissions(
    input: &ResolutionInput<'_>,
    model: PermissionModel,
    now: DateTime<Utc>,
) -> EffectivePermissions {
    let active_catalog: BTreeSet<&PermissionKey> = input
        .catalog
        .iter()
        .filter(|definition| definition.is_active())
        .map(PermissionDefinition::key)
        .collect();

    let admin_status = match input.admin_status {
        AdminStatus::Unresolved => AdminStatus::from_role_grants(input.role_grants, now),
        resolved => resolved,
    };

    if admin_status.is_admin() {
        let provenance = active_catalog
            .into_iter()
            .map(|key| (key.clone(), PermissionSource::Admin))
            .collect();
        return EffectivePermissions::from_parts(model, true, provenance);
    }

    let mut provenance = BTreeMap::new();

    if model == PermissionModel::RolesAndOverrides {
        for grant in input
            .role_grants
            .iter()
            .filter(|grant| grant.is_in_force_at(now))
        {
            for key in &grant.permissions {
                if active_catalog.contains(key) {
                    provenance
                        .entry(key.clone())
                        .or_insert(PermissionSource::Role);
                }
            }
        }
    }

    let active_overrides = input
        .overrides
        .iter()
        .filter(|value| value.is_active_at(now) && active_catalog.contains(&value.permission_key));

    let mut revoked = Vec::new();
    for value in active_overrides {
        if value.is_granted {
            provenance
                .entry(value.permission_key.clone())
                .or_insert(PermissionSource::Granted);
        } else {
            revoked.push(value.permission_key.clone());
        }
    }

    for key in revoked {
        provenance.insert(key, PermissionSource::Revoked);
    }

    EffectivePermissions::from_parts(model, false, provenance)
}
