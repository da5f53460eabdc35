//! Row types and decoders shared by the PostgreSQL repositories.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keystone_core::{AppError, AppResult, PrincipalId, TenantId};
use keystone_domain::{
    PermissionDefinition, PermissionKey, PermissionOverride, RoleAssignment, RoleDefinition,
    RoleId, RoleKey,
};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(crate) struct PermissionRow {
    pub(crate) key: String,
    pub(crate) description: Option<String>,
    pub(crate) is_active: bool,
}

impl PermissionRow {
    pub(crate) fn into_definition(self) -> AppResult<PermissionDefinition> {
        Ok(PermissionDefinition::from_storage(
            decode_permission_key(self.key.as_str())?,
            self.description,
            self.is_active,
        ))
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct OverrideRow {
    pub(crate) principal_id: Uuid,
    pub(crate) tenant_id: Uuid,
    pub(crate) permission_key: String,
    pub(crate) is_granted: bool,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) reason: String,
    pub(crate) granted_by: Uuid,
    pub(crate) updated_at: DateTime<Utc>,
}

impl OverrideRow {
    pub(crate) fn into_override(self) -> AppResult<PermissionOverride> {
        Ok(PermissionOverride {
            principal_id: PrincipalId::from_uuid(self.principal_id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            permission_key: decode_permission_key(self.permission_key.as_str())?,
            is_granted: self.is_granted,
            expires_at: self.expires_at,
            reason: self.reason,
            granted_by: PrincipalId::from_uuid(self.granted_by),
            updated_at: self.updated_at,
        })
    }
}

/// One role joined with at most one attached permission.
#[derive(Debug, FromRow)]
pub(crate) struct RoleRow {
    pub(crate) role_id: Uuid,
    pub(crate) tenant_id: Option<Uuid>,
    pub(crate) role_key: String,
    pub(crate) display_name: String,
    pub(crate) is_system: bool,
    pub(crate) is_active: bool,
    pub(crate) permission_key: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct AssignmentRow {
    pub(crate) principal_id: Uuid,
    pub(crate) tenant_id: Uuid,
    pub(crate) role_id: Uuid,
    pub(crate) role_key: String,
    pub(crate) assigned_at: DateTime<Utc>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) assigned_by: Option<Uuid>,
}

impl AssignmentRow {
    pub(crate) fn into_assignment(self) -> AppResult<RoleAssignment> {
        Ok(RoleAssignment {
            principal_id: PrincipalId::from_uuid(self.principal_id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            role_id: RoleId::from_uuid(self.role_id),
            role_key: decode_role_key(self.role_key.as_str())?,
            assigned_at: self.assigned_at,
            expires_at: self.expires_at,
            assigned_by: self.assigned_by.map(PrincipalId::from_uuid),
        })
    }
}

/// Folds joined role rows into role definitions, keeping row order.
pub(crate) fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<RoleDefinition>> {
    let mut order = Vec::new();
    let mut by_id: BTreeMap<Uuid, RoleDefinition> = BTreeMap::new();

    for row in rows {
        if !by_id.contains_key(&row.role_id) {
            order.push(row.role_id);
            by_id.insert(
                row.role_id,
                RoleDefinition {
                    role_id: RoleId::from_uuid(row.role_id),
                    tenant_id: row.tenant_id.map(TenantId::from_uuid),
                    key: decode_role_key(row.role_key.as_str())?,
                    display_name: row.display_name,
                    is_system: row.is_system,
                    is_active: row.is_active,
                    permissions: Vec::new(),
                },
            );
        }

        if let (Some(permission_key), Some(role)) =
            (row.permission_key, by_id.get_mut(&row.role_id))
        {
            role.permissions
                .push(decode_permission_key(permission_key.as_str())?);
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|role_id| by_id.remove(&role_id))
        .collect())
}

pub(crate) fn decode_permission_key(value: &str) -> AppResult<PermissionKey> {
    PermissionKey::new(value).map_err(|error| {
        AppError::Internal(format!("invalid stored permission key '{value}': {error}"))
    })
}

pub(crate) fn decode_role_key(value: &str) -> AppResult<RoleKey> {
    RoleKey::new(value)
        .map_err(|error| AppError::Internal(format!("invalid stored role key '{value}': {error}")))
}
