use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::security_admin_ports::{CreateRoleInput, SecurityAdminRepository};
use keystone_application::{AuthorizationRepository, PrincipalDirectory};
use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{
    PermissionDefinition, PermissionKey, PermissionOverride, RoleAssignment, RoleDefinition,
    RoleGrant, RoleId, RoleKey, default_permission_catalog,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    tenants: HashMap<TenantId, String>,
    principals: HashMap<PrincipalId, TenantId>,
    catalog: Vec<PermissionDefinition>,
    roles: Vec<RoleDefinition>,
    assignments: Vec<RoleAssignment>,
    overrides: HashMap<(PrincipalId, PermissionKey), PermissionOverride>,
}

impl StoreState {
    fn role(&self, role_id: RoleId) -> AppResult<&RoleDefinition> {
        self.roles
            .iter()
            .find(|role| role.role_id == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    fn role_mut(&mut self, role_id: RoleId) -> AppResult<&mut RoleDefinition> {
        self.roles
            .iter_mut()
            .find(|role| role.role_id == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    fn ensure_permission_exists(&self, permission_key: &PermissionKey) -> AppResult<()> {
        if self
            .catalog
            .iter()
            .any(|definition| definition.key() == permission_key)
        {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "permission '{permission_key}' does not exist"
        )))
    }

    fn ensure_principal_in_tenant(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<()> {
        match self.principals.get(&principal_id) {
            Some(stored) if *stored == tenant_id => Ok(()),
            _ => Err(AppError::NotFound(format!(
                "principal '{principal_id}' does not exist in tenant '{tenant_id}'"
            ))),
        }
    }
}

/// In-memory relational store for the authorization data model.
///
/// One lock guards every table so each write is atomic across them. New stores
/// are seeded with the default permission catalog and the system `admin` role.
#[derive(Debug)]
pub struct InMemoryAuthorizationStore {
    state: RwLock<StoreState>,
}

impl InMemoryAuthorizationStore {
    /// Creates a store seeded with the default catalog and the admin role.
    #[must_use]
    pub fn new() -> Self {
        let admin_role = RoleDefinition {
            role_id: RoleId::new(),
            tenant_id: None,
            key: RoleKey::admin(),
            display_name: "Administrator".to_owned(),
            is_system: true,
            is_active: true,
            permissions: Vec::new(),
        };

        Self {
            state: RwLock::new(StoreState {
                catalog: default_permission_catalog(),
                roles: vec![admin_role],
                ..StoreState::default()
            }),
        }
    }
}

impl Default for InMemoryAuthorizationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryAuthorizationStore {
    async fn ensure_tenant(&self, tenant_id: TenantId, name: &str) -> AppResult<()> {
        self.state
            .write()
            .await
            .tenants
            .entry(tenant_id)
            .or_insert_with(|| name.to_owned());
        Ok(())
    }

    async fn register_principal(
        &self,
        principal: PrincipalIdentity,
        _display_name: &str,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.tenants.contains_key(&principal.tenant_id()) {
            return Err(AppError::NotFound(format!(
                "tenant '{}' does not exist",
                principal.tenant_id()
            )));
        }

        match state.principals.get(&principal.principal_id()) {
            Some(tenant_id) if *tenant_id == principal.tenant_id() => Ok(()),
            Some(_) => Err(AppError::Conflict(format!(
                "principal '{}' already belongs to another tenant",
                principal.principal_id()
            ))),
            None => {
                state
                    .principals
                    .insert(principal.principal_id(), principal.tenant_id());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AuthorizationRepository for InMemoryAuthorizationStore {
    async fn principal_tenant(&self, principal_id: PrincipalId) -> AppResult<Option<TenantId>> {
        Ok(self.state.read().await.principals.get(&principal_id).copied())
    }

    async fn list_permission_catalog(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self.state.read().await.catalog.clone())
    }

    async fn list_role_grants_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleGrant>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.tenant_id == tenant_id && assignment.principal_id == principal_id
            })
            .filter_map(|assignment| {
                state.role(assignment.role_id).ok().map(|role| RoleGrant {
                    role_key: role.key.clone(),
                    role_is_active: role.is_active,
                    assignment_expires_at: assignment.expires_at,
                    permissions: role.permissions.clone(),
                })
            })
            .collect())
    }

    async fn list_overrides_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        SecurityAdminRepository::list_overrides(self, tenant_id, principal_id).await
    }

    async fn has_active_admin_assignment(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let state = self.state.read().await;

        Ok(state.assignments.iter().any(|assignment| {
            assignment.tenant_id == tenant_id
                && assignment.principal_id == principal_id
                && assignment.is_active_at(now)
                && state
                    .role(assignment.role_id)
                    .is_ok_and(|role| role.key.is_admin() && role.is_active)
        }))
    }

    async fn list_principals(&self) -> AppResult<Vec<PrincipalIdentity>> {
        let state = self.state.read().await;

        let mut principals: Vec<PrincipalIdentity> = state
            .principals
            .iter()
            .map(|(principal_id, tenant_id)| PrincipalIdentity::new(*principal_id, *tenant_id))
            .collect();
        principals.sort_by_key(|principal| principal.principal_id());

        Ok(principals)
    }
}

#[async_trait]
impl SecurityAdminRepository for InMemoryAuthorizationStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let mut catalog = self.state.read().await.catalog.clone();
        catalog.sort_by(|left, right| left.key().cmp(right.key()));
        Ok(catalog)
    }

    async fn find_permission(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .state
            .read()
            .await
            .catalog
            .iter()
            .find(|definition| definition.key() == permission_key)
            .cloned())
    }

    async fn register_permission(
        &self,
        definition: PermissionDefinition,
    ) -> AppResult<PermissionDefinition> {
        let mut state = self.state.write().await;
        if state.ensure_permission_exists(definition.key()).is_ok() {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                definition.key()
            )));
        }

        state.catalog.push(definition.clone());
        Ok(definition)
    }

    async fn set_permission_active(
        &self,
        permission_key: &PermissionKey,
        is_active: bool,
    ) -> AppResult<PermissionDefinition> {
        let mut state = self.state.write().await;
        let definition = state
            .catalog
            .iter_mut()
            .find(|definition| definition.key() == permission_key)
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_key}' does not exist"))
            })?;

        *definition = definition.clone().with_active(is_active);
        Ok(definition.clone())
    }

    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        let mut roles: Vec<RoleDefinition> = self
            .state
            .read()
            .await
            .roles
            .iter()
            .filter(|role| role.is_visible_to(tenant_id))
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(roles)
    }

    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_key: &RoleKey,
    ) -> AppResult<Option<RoleDefinition>> {
        let state = self.state.read().await;
        let visible = state
            .roles
            .iter()
            .filter(|role| &role.key == role_key && role.is_visible_to(tenant_id));

        Ok(visible
            .min_by_key(|role| role.tenant_id.is_none())
            .cloned())
    }

    async fn create_role(
        &self,
        tenant_id: TenantId,
        _created_by: PrincipalId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.write().await;
        if state
            .roles
            .iter()
            .any(|role| role.key == input.key && role.tenant_id == Some(tenant_id))
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists for tenant '{tenant_id}'",
                input.key
            )));
        }

        for permission_key in &input.permissions {
            state.ensure_permission_exists(permission_key)?;
        }

        let mut permissions = input.permissions;
        permissions.sort();
        permissions.dedup();

        let role = RoleDefinition {
            role_id: RoleId::new(),
            tenant_id: Some(tenant_id),
            key: input.key,
            display_name: input.display_name.trim().to_owned(),
            is_system: false,
            is_active: true,
            permissions,
        };
        state.roles.push(role.clone());

        Ok(role)
    }

    async fn set_role_active(
        &self,
        role_id: RoleId,
        is_active: bool,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.write().await;
        let role = state.role_mut(role_id)?;
        role.is_active = is_active;
        Ok(role.clone())
    }

    async fn attach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
        _granted_by: PrincipalId,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        state.ensure_permission_exists(permission_key)?;

        let role = state.role_mut(role_id)?;
        if role.permissions.contains(permission_key) {
            return Ok(false);
        }

        role.permissions.push(permission_key.clone());
        role.permissions.sort();
        Ok(true)
    }

    async fn detach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let role = state.role_mut(role_id)?;

        let before = role.permissions.len();
        role.permissions.retain(|stored| stored != permission_key);
        Ok(role.permissions.len() != before)
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let mut state = self.state.write().await;
        state.ensure_principal_in_tenant(assignment.tenant_id, assignment.principal_id)?;

        let role = state.role(assignment.role_id)?;
        if !role.is_visible_to(assignment.tenant_id) {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist in tenant '{}'",
                role.key, assignment.tenant_id
            )));
        }

        state.assignments.retain(|stored| {
            !(stored.principal_id == assignment.principal_id
                && stored.role_id == assignment.role_id)
        });
        state.assignments.push(assignment.clone());

        Ok(assignment)
    }

    async fn revoke_role(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.assignments.len();
        state.assignments.retain(|stored| {
            !(stored.tenant_id == tenant_id
                && stored.principal_id == principal_id
                && stored.role_id == role_id)
        });
        Ok(state.assignments.len() != before)
    }

    async fn list_role_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>> {
        let mut assignments: Vec<RoleAssignment> = self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|assignment| assignment.tenant_id == tenant_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|assignment| assignment.assigned_at);
        Ok(assignments)
    }

    async fn upsert_override(&self, value: PermissionOverride) -> AppResult<PermissionOverride> {
        let mut state = self.state.write().await;
        state.ensure_principal_in_tenant(value.tenant_id, value.principal_id)?;
        state.ensure_permission_exists(&value.permission_key)?;

        state.overrides.insert(
            (value.principal_id, value.permission_key.clone()),
            value.clone(),
        );
        Ok(value)
    }

    async fn delete_override(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let key = (principal_id, permission_key.clone());
        if state
            .overrides
            .get(&key)
            .is_none_or(|stored| stored.tenant_id != tenant_id)
        {
            return Ok(false);
        }

        state.overrides.remove(&key);
        Ok(true)
    }

    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        let mut overrides: Vec<PermissionOverride> = self
            .state
            .read()
            .await
            .overrides
            .values()
            .filter(|value| value.tenant_id == tenant_id && value.principal_id == principal_id)
            .cloned()
            .collect();
        overrides.sort_by(|left, right| left.permission_key.cmp(&right.permission_key));
        Ok(overrides)
    }

    async fn remove_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.ensure_principal_in_tenant(tenant_id, principal_id).is_err() {
            return Ok(false);
        }

        state.principals.remove(&principal_id);
        state
            .assignments
            .retain(|assignment| assignment.principal_id != principal_id);
        state
            .overrides
            .retain(|(stored_principal, _), _| *stored_principal != principal_id);

        Ok(true)
    }
}
