use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use keystone_core::{AppError, AppResult, PrincipalIdentity};
use keystone_domain::{
    AdminStatus, EffectivePermissions, PermissionDecision, PermissionModel, ResolutionInput,
    resolve_effective_permissions,
};
use tracing::warn;

use crate::AuthorizationRepository;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Loads a principal's roles and overrides and computes the effective set.
///
/// The resolver depends only on leaf repository lookups. It never calls back
/// into [`crate::AuthorizationService`] or the cache.
#[derive(Clone)]
pub struct PermissionResolver {
    repository: Arc<dyn AuthorizationRepository>,
    model: PermissionModel,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl PermissionResolver {
    /// Creates a resolver bound to one permission model.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>, model: PermissionModel) -> Self {
        Self {
            repository,
            model,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Overrides how many times a transient store failure is attempted.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Overrides the base delay between retries.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Returns the configured permission model.
    #[must_use]
    pub fn model(&self) -> PermissionModel {
        self.model
    }

    /// Returns the underlying read repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn AuthorizationRepository> {
        &self.repository
    }

    /// Resolves the principal's effective permissions from source data.
    ///
    /// Transient store failures are retried with linear backoff; any other
    /// error is returned immediately.
    pub async fn resolve(&self, principal: PrincipalIdentity) -> AppResult<EffectivePermissions> {
        let mut attempt = 1;
        loop {
            match self.resolve_once(principal).await {
                Ok(permissions) => return Ok(permissions),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        principal_id = %principal.principal_id(),
                        tenant_id = %principal.tenant_id(),
                        attempt,
                        error = %error,
                        "transient failure while resolving permissions, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Returns the decision for one permission and the source that produced it.
    pub async fn explain(
        &self,
        principal: PrincipalIdentity,
        permission_key: &str,
    ) -> AppResult<PermissionDecision> {
        Ok(self.resolve(principal).await?.explain(permission_key))
    }

    async fn resolve_once(&self, principal: PrincipalIdentity) -> AppResult<EffectivePermissions> {
        let tenant_id = principal.tenant_id();
        let principal_id = principal.principal_id();
        let now = Utc::now();

        match self.repository.principal_tenant(principal_id).await? {
            Some(stored_tenant) if stored_tenant == tenant_id => {}
            Some(_) => {
                return Err(AppError::Unauthorized(format!(
                    "principal '{principal_id}' does not belong to tenant '{tenant_id}'"
                )));
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "principal '{principal_id}' does not exist"
                )));
            }
        }

        let admin_status = if self
            .repository
            .has_active_admin_assignment(tenant_id, principal_id, now)
            .await?
        {
            AdminStatus::Admin
        } else {
            AdminStatus::NonAdmin
        };

        let catalog = self.repository.list_permission_catalog().await?;

        let (role_grants, overrides) = if admin_status.is_admin() {
            (Vec::new(), Vec::new())
        } else {
            let role_grants = match self.model {
                PermissionModel::RolesAndOverrides => {
                    self.repository
                        .list_role_grants_for_principal(tenant_id, principal_id)
                        .await?
                }
                PermissionModel::OverridesOnly => Vec::new(),
            };
            let overrides = self
                .repository
                .list_overrides_for_principal(tenant_id, principal_id)
                .await?;
            (role_grants, overrides)
        };

        Ok(resolve_effective_permissions(
            &ResolutionInput {
                admin_status,
                catalog: &catalog,
                role_grants: &role_grants,
                overrides: &overrides,
            },
            self.model,
            now,
        ))
    }
}
