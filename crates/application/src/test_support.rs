//! In-process fakes shared by service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{
    PermissionDefinition, PermissionKey, PermissionModel, PermissionOverride, RoleAssignment,
    RoleDefinition, RoleGrant, RoleId, RoleKey, default_permission_catalog,
};

use crate::security_admin_ports::{CreateRoleInput, SecurityAdminRepository};
use crate::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
    AuthorizationRepository, AuthorizationService, CacheEpoch, CachedPermissions,
    PermissionCache, PermissionCacheStore, PermissionResolver, SnapshotEntry,
};

pub(crate) fn key(value: &str) -> PermissionKey {
    match PermissionKey::new(value) {
        Ok(key) => key,
        Err(error) => panic!("invalid test key '{value}': {error}"),
    }
}

pub(crate) fn role_key(value: &str) -> RoleKey {
    match RoleKey::new(value) {
        Ok(key) => key,
        Err(error) => panic!("invalid test role key '{value}': {error}"),
    }
}

#[derive(Default)]
struct StoreState {
    catalog: Vec<PermissionDefinition>,
    principals: HashMap<PrincipalId, TenantId>,
    roles: Vec<RoleDefinition>,
    assignments: Vec<RoleAssignment>,
    overrides: Vec<PermissionOverride>,
    departed: Vec<PrincipalIdentity>,
}

/// Holds the next override read until the test releases it.
#[derive(Default)]
pub(crate) struct ReadGate {
    reached: Notify,
    release: Notify,
}

impl ReadGate {
    /// Waits until a read is parked at the gate.
    pub(crate) async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Lets the parked read continue.
    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

/// Fake relational store backing both repository ports.
pub(crate) struct FakeStore {
    state: Mutex<StoreState>,
    failures_remaining: AtomicUsize,
    override_gate: Mutex<Option<Arc<ReadGate>>>,
    pub(crate) reads: AtomicUsize,
    pub(crate) tenant_lookups: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
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
            state: Mutex::new(StoreState {
                catalog: default_permission_catalog(),
                roles: vec![admin_role],
                ..StoreState::default()
            }),
            failures_remaining: AtomicUsize::new(0),
            override_gate: Mutex::new(None),
            reads: AtomicUsize::new(0),
            tenant_lookups: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` catalog reads fail with a transient error.
    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Parks the next override read, after its rows are read, until the
    /// returned gate is released.
    pub(crate) async fn gate_next_override_read(&self) -> Arc<ReadGate> {
        let gate = Arc::new(ReadGate::default());
        *self.override_gate.lock().await = Some(gate.clone());
        gate
    }

    /// Lists a principal that is already gone from the principal table, as
    /// when a removal commits between listing and resolving.
    pub(crate) async fn add_departed_principal(&self, tenant_id: TenantId) -> PrincipalIdentity {
        let principal = PrincipalIdentity::new(PrincipalId::new(), tenant_id);
        self.state.lock().await.departed.push(principal);
        principal
    }

    pub(crate) async fn add_principal(&self, tenant_id: TenantId) -> PrincipalIdentity {
        let principal_id = PrincipalId::new();
        self.state
            .lock()
            .await
            .principals
            .insert(principal_id, tenant_id);
        PrincipalIdentity::new(principal_id, tenant_id)
    }

    pub(crate) async fn add_role(
        &self,
        tenant_id: TenantId,
        key: &str,
        permissions: &[&str],
    ) -> RoleId {
        let role_id = RoleId::new();
        self.state.lock().await.roles.push(RoleDefinition {
            role_id,
            tenant_id: Some(tenant_id),
            key: role_key(key),
            display_name: key.to_owned(),
            is_system: false,
            is_active: true,
            permissions: permissions.iter().map(|value| self::key(value)).collect(),
        });
        role_id
    }

    pub(crate) async fn assign(
        &self,
        principal: PrincipalIdentity,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state.lock().await;
        let Some(role) = state
            .roles
            .iter()
            .find(|role| role.key.as_str() == key && role.is_visible_to(principal.tenant_id()))
            .cloned()
        else {
            panic!("unknown test role '{key}'");
        };
        state.assignments.push(RoleAssignment {
            principal_id: principal.principal_id(),
            tenant_id: principal.tenant_id(),
            role_id: role.role_id,
            role_key: role.key,
            assigned_at: Utc::now(),
            expires_at,
            assigned_by: None,
        });
    }

    pub(crate) async fn put_override(
        &self,
        principal: PrincipalIdentity,
        permission: &str,
        is_granted: bool,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let value = PermissionOverride {
            principal_id: principal.principal_id(),
            tenant_id: principal.tenant_id(),
            permission_key: key(permission),
            is_granted,
            expires_at,
            reason: "test".to_owned(),
            granted_by: principal.principal_id(),
            updated_at: Utc::now(),
        };
        let mut state = self.state.lock().await;
        state.overrides.retain(|stored| {
            !(stored.principal_id == value.principal_id
                && stored.permission_key == value.permission_key)
        });
        state.overrides.push(value);
    }

    fn maybe_fail(&self) -> AppResult<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Unavailable("fake store offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationRepository for FakeStore {
    async fn principal_tenant(&self, principal_id: PrincipalId) -> AppResult<Option<TenantId>> {
        self.tenant_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.principals.get(&principal_id).copied())
    }

    async fn list_permission_catalog(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.maybe_fail()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.catalog.clone())
    }

    async fn list_role_grants_for_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleGrant>> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|value| value.tenant_id == tenant_id && value.principal_id == principal_id)
            .filter_map(|value| {
                state
                    .roles
                    .iter()
                    .find(|role| role.role_id == value.role_id)
                    .map(|role| RoleGrant {
                        role_key: role.key.clone(),
                        role_is_active: role.is_active,
                        assignment_expires_at: value.expires_at,
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
        let overrides =
            SecurityAdminRepository::list_overrides(self, tenant_id, principal_id).await?;
        let gate = self.override_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }
        Ok(overrides)
    }

    async fn has_active_admin_assignment(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.assignments.iter().any(|value| {
            value.tenant_id == tenant_id
                && value.principal_id == principal_id
                && value.is_active_at(now)
                && state.roles.iter().any(|role| {
                    role.role_id == value.role_id && role.key.is_admin() && role.is_active
                })
        }))
    }

    async fn list_principals(&self) -> AppResult<Vec<PrincipalIdentity>> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .iter()
            .map(|(principal_id, tenant_id)| PrincipalIdentity::new(*principal_id, *tenant_id))
            .chain(state.departed.iter().copied())
            .collect())
    }
}

#[async_trait]
impl SecurityAdminRepository for FakeStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self.state.lock().await.catalog.clone())
    }

    async fn find_permission(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .state
            .lock()
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
        let mut state = self.state.lock().await;
        if state
            .catalog
            .iter()
            .any(|stored| stored.key() == definition.key())
        {
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
        let mut state = self.state.lock().await;
        let Some(definition) = state
            .catalog
            .iter_mut()
            .find(|definition| definition.key() == permission_key)
        else {
            return Err(AppError::NotFound(format!(
                "permission '{permission_key}' does not exist"
            )));
        };
        *definition = definition.clone().with_active(is_active);
        Ok(definition.clone())
    }

    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .iter()
            .filter(|role| role.is_visible_to(tenant_id))
            .cloned()
            .collect())
    }

    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_key: &RoleKey,
    ) -> AppResult<Option<RoleDefinition>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<&RoleDefinition> = state
            .roles
            .iter()
            .filter(|role| &role.key == role_key && role.is_visible_to(tenant_id))
            .collect();
        candidates.sort_by_key(|role| role.tenant_id.is_none());
        Ok(candidates.first().map(|role| (*role).clone()))
    }

    async fn create_role(
        &self,
        tenant_id: TenantId,
        _created_by: PrincipalId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.lock().await;
        if state
            .roles
            .iter()
            .any(|role| role.key == input.key && role.tenant_id == Some(tenant_id))
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.key
            )));
        }
        let role = RoleDefinition {
            role_id: RoleId::new(),
            tenant_id: Some(tenant_id),
            key: input.key,
            display_name: input.display_name,
            is_system: false,
            is_active: true,
            permissions: input.permissions,
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn set_role_active(
        &self,
        role_id: RoleId,
        is_active: bool,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.lock().await;
        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        };
        role.is_active = is_active;
        Ok(role.clone())
    }

    async fn attach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
        _granted_by: PrincipalId,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        };
        if role.permissions.contains(permission_key) {
            return Ok(false);
        }
        role.permissions.push(permission_key.clone());
        Ok(true)
    }

    async fn detach_permission(
        &self,
        role_id: RoleId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(role) = state.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        };
        let before = role.permissions.len();
        role.permissions.retain(|value| value != permission_key);
        Ok(role.permissions.len() != before)
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let mut state = self.state.lock().await;
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
        let mut state = self.state.lock().await;
        let before = state.assignments.len();
        state.assignments.retain(|stored| {
            !(stored.tenant_id == tenant_id
                && stored.principal_id == principal_id
                && stored.role_id == role_id)
        });
        Ok(state.assignments.len() != before)
    }

    async fn list_role_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|value| value.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn upsert_override(&self, value: PermissionOverride) -> AppResult<PermissionOverride> {
        let mut state = self.state.lock().await;
        state.overrides.retain(|stored| {
            !(stored.principal_id == value.principal_id
                && stored.permission_key == value.permission_key)
        });
        state.overrides.push(value.clone());
        Ok(value)
    }

    async fn delete_override(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.overrides.len();
        state.overrides.retain(|stored| {
            !(stored.tenant_id == tenant_id
                && stored.principal_id == principal_id
                && &stored.permission_key == permission_key)
        });
        Ok(state.overrides.len() != before)
    }

    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        Ok(self
            .state
            .lock()
            .await
            .overrides
            .iter()
            .filter(|value| value.tenant_id == tenant_id && value.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn remove_principal(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.principals.get(&principal_id) != Some(&tenant_id) {
            return Ok(false);
        }
        state.principals.remove(&principal_id);
        state
            .assignments
            .retain(|value| value.principal_id != principal_id);
        state
            .overrides
            .retain(|value| value.principal_id != principal_id);
        Ok(true)
    }
}

#[derive(Default)]
struct FakeEpochs {
    global: u64,
    principals: HashMap<PrincipalId, u64>,
}

impl FakeEpochs {
    fn current(&self, principal_id: PrincipalId) -> CacheEpoch {
        CacheEpoch {
            global: self.global,
            principal: self.principals.get(&principal_id).copied().unwrap_or(0),
        }
    }
}

/// Fake cache store that can be switched into a failing mode.
///
/// Lock order is `epochs` then `entries`.
#[derive(Default)]
pub(crate) struct FakeCacheStore {
    pub(crate) entries: Mutex<HashMap<PrincipalId, CachedPermissions>>,
    epochs: Mutex<FakeEpochs>,
    pub(crate) failing: Mutex<bool>,
}

impl FakeCacheStore {
    async fn check(&self) -> AppResult<()> {
        if *self.failing.lock().await {
            return Err(AppError::Unavailable("fake cache offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionCacheStore for FakeCacheStore {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<CachedPermissions>> {
        self.check().await?;
        Ok(self.entries.lock().await.get(&principal_id).cloned())
    }

    async fn epoch(&self, principal_id: PrincipalId) -> AppResult<CacheEpoch> {
        self.check().await?;
        Ok(self.epochs.lock().await.current(principal_id))
    }

    async fn put(&self, entry: CachedPermissions, observed: CacheEpoch) -> AppResult<bool> {
        self.check().await?;
        let epochs = self.epochs.lock().await;
        if epochs.current(entry.principal_id) != observed {
            return Ok(false);
        }
        self.entries.lock().await.insert(entry.principal_id, entry);
        Ok(true)
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        self.check().await?;
        let mut epochs = self.epochs.lock().await;
        *epochs.principals.entry(principal_id).or_insert(0) += 1;
        self.entries.lock().await.remove(&principal_id);
        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        self.check().await?;
        let mut epochs = self.epochs.lock().await;
        epochs.global += 1;
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn replace_all(&self, entries: Vec<SnapshotEntry>) -> AppResult<usize> {
        self.check().await?;
        let epochs = self.epochs.lock().await;
        let snapshot: HashMap<PrincipalId, CachedPermissions> = entries
            .into_iter()
            .filter(|value| epochs.current(value.entry.principal_id) == value.observed)
            .map(|value| (value.entry.principal_id, value.entry))
            .collect();
        let installed = snapshot.len();
        *self.entries.lock().await = snapshot;
        Ok(installed)
    }
}

/// Fake audit sink that also serves the audit log.
#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditRepository {
    async fn list_recent_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .rev()
            .filter(|event| event.tenant_id == tenant_id)
            .skip(query.offset)
            .take(query.limit)
            .map(|event| AuditLogEntry {
                event_id: uuid::Uuid::new_v4(),
                actor_id: event.actor_id,
                action: event.action.as_str().to_owned(),
                resource_type: event.resource_type.clone(),
                resource_id: event.resource_id.clone(),
                detail: event.detail.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Wired services over shared fakes.
pub(crate) struct Harness {
    pub(crate) store: Arc<FakeStore>,
    pub(crate) cache_store: Arc<FakeCacheStore>,
    pub(crate) audit: Arc<FakeAuditRepository>,
    pub(crate) authorization: AuthorizationService,
}

impl Harness {
    pub(crate) fn new(model: PermissionModel) -> Self {
        let store = Arc::new(FakeStore::new());
        let cache_store = Arc::new(FakeCacheStore::default());
        let resolver = PermissionResolver::new(store.clone(), model)
            .with_retry_backoff(std::time::Duration::from_millis(1));
        let cache = PermissionCache::new(cache_store.clone(), resolver);
        let authorization = AuthorizationService::new(store.clone(), cache);

        Self {
            store,
            cache_store,
            audit: Arc::new(FakeAuditRepository::default()),
            authorization,
        }
    }

    pub(crate) fn security_admin(&self) -> crate::SecurityAdminService {
        crate::SecurityAdminService::new(
            self.authorization.clone(),
            self.store.clone(),
            self.audit.clone(),
            self.audit.clone(),
        )
    }
}
