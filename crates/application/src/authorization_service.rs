use std::sync::Arc;

use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::{EffectivePermissions, PermissionDecision, PermissionKey, SecurityPermission};
use tracing::debug;

use crate::{
    AccessDecision, AuthorizationRepository, DenialReason, PermissionCache, TenantGuard,
};

const NOT_PERMITTED: &str = "not permitted";

/// Application service answering tenant-scoped permission checks.
///
/// Unknown principals and unknown permission keys are denials, not errors.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
    cache: PermissionCache,
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>, cache: PermissionCache) -> Self {
        Self { repository, cache }
    }

    /// Returns the cache used for hot-path checks.
    #[must_use]
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Returns the tenant a principal belongs to.
    pub async fn principal_tenant(&self, principal_id: PrincipalId) -> AppResult<TenantId> {
        self.repository
            .principal_tenant(principal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}' does not exist")))
    }

    /// Binds a principal id to its tenant.
    pub async fn identify(&self, principal_id: PrincipalId) -> AppResult<PrincipalIdentity> {
        let tenant_id = self.principal_tenant(principal_id).await?;
        Ok(PrincipalIdentity::new(principal_id, tenant_id))
    }

    /// Returns whether the principal currently holds the permission.
    pub async fn has_permission(
        &self,
        principal_id: PrincipalId,
        permission_key: &str,
    ) -> AppResult<bool> {
        let Some(permissions) = self.cached_permissions(principal_id).await? else {
            return Ok(false);
        };

        Ok(permissions.allows(permission_key))
    }

    /// Returns whether the principal holds at least one of the permissions.
    ///
    /// An empty list is never satisfied.
    pub async fn has_any_permission(
        &self,
        principal_id: PrincipalId,
        permission_keys: &[&str],
    ) -> AppResult<bool> {
        if permission_keys.is_empty() {
            return Ok(false);
        }

        let Some(permissions) = self.cached_permissions(principal_id).await? else {
            return Ok(false);
        };

        Ok(permission_keys.iter().any(|key| permissions.allows(key)))
    }

    /// Returns the principal's effective permissions sorted by key.
    pub async fn effective_permissions(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionKey>> {
        let principal = self.identify(principal_id).await?;
        Ok(self.cache.get(principal).await?.to_sorted_keys())
    }

    /// Decides access to a resource owned by `resource_tenant`.
    ///
    /// The tenant check runs first and short-circuits; permissions are only
    /// resolved for same-tenant requests. A fresh cache entry supplies both the
    /// tenant binding and the permissions without touching the repository.
    pub async fn authorize(
        &self,
        principal_id: PrincipalId,
        resource_tenant: TenantId,
        permission_key: &str,
    ) -> AppResult<AccessDecision> {
        let cached = self.cache.fresh_entry(principal_id).await;
        let principal_tenant = match &cached {
            Some(entry) => entry.tenant_id,
            None => match self.repository.principal_tenant(principal_id).await? {
                Some(tenant_id) => tenant_id,
                None => return Ok(AccessDecision::Denied(DenialReason::UnknownPrincipal)),
            },
        };

        if !TenantGuard::permits(principal_tenant, resource_tenant) {
            debug!(
                principal_id = %principal_id,
                principal_tenant = %principal_tenant,
                resource_tenant = %resource_tenant,
                "cross-tenant access denied"
            );
            return Ok(AccessDecision::Denied(DenialReason::TenantMismatch));
        }

        let permissions = match cached {
            Some(entry) => entry.permissions,
            None => {
                self.cache
                    .rebuild_principal(PrincipalIdentity::new(principal_id, principal_tenant))
                    .await?
            }
        };

        Ok(TenantGuard::decide(
            principal_tenant,
            resource_tenant,
            permissions.allows(permission_key),
        ))
    }

    /// Fails with a uniform denial unless the principal holds the permission.
    pub async fn require_permission(
        &self,
        principal_id: PrincipalId,
        permission_key: &str,
    ) -> AppResult<()> {
        if self.has_permission(principal_id, permission_key).await? {
            Ok(())
        } else {
            Err(AppError::Forbidden(NOT_PERMITTED.to_owned()))
        }
    }

    /// Fails with a uniform denial unless [`Self::authorize`] allows access.
    pub async fn require_access(
        &self,
        principal_id: PrincipalId,
        resource_tenant: TenantId,
        permission_key: &str,
    ) -> AppResult<()> {
        if self
            .authorize(principal_id, resource_tenant, permission_key)
            .await?
            .is_allowed()
        {
            Ok(())
        } else {
            Err(AppError::Forbidden(NOT_PERMITTED.to_owned()))
        }
    }

    /// Ensures an already identified actor holds a security permission.
    pub async fn require_security_permission(
        &self,
        actor: &PrincipalIdentity,
        permission: SecurityPermission,
    ) -> AppResult<()> {
        let permissions = self.cache.get(*actor).await?;
        if permissions.allows(permission.as_str()) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "principal '{}' is missing permission '{}' in tenant '{}'",
            actor.principal_id(),
            permission.as_str(),
            actor.tenant_id()
        )))
    }

    /// Resolves from source data, bypassing the cache.
    pub async fn resolve_direct(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<EffectivePermissions> {
        let principal = self.identify(principal_id).await?;
        self.cache.resolver().resolve(principal).await
    }

    /// Explains the decision for one permission from source data.
    pub async fn explain(
        &self,
        principal_id: PrincipalId,
        permission_key: &str,
    ) -> AppResult<PermissionDecision> {
        let principal = self.identify(principal_id).await?;
        self.cache
            .resolver()
            .explain(principal, permission_key)
            .await
    }

    async fn cached_permissions(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Option<EffectivePermissions>> {
        if let Some(entry) = self.cache.fresh_entry(principal_id).await {
            return Ok(Some(entry.permissions));
        }

        let Some(tenant_id) = self.repository.principal_tenant(principal_id).await? else {
            return Ok(None);
        };

        let permissions = self
            .cache
            .rebuild_principal(PrincipalIdentity::new(principal_id, tenant_id))
            .await?;
        Ok(Some(permissions))
    }
}

#[cfg(test)]
mod tests;
