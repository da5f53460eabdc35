use std::sync::Arc;

use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity};
use keystone_domain::{
    AuditAction, PermissionDefinition, PermissionKey, RoleDefinition, RoleKey, SecurityPermission,
};

use crate::security_admin_ports::SecurityAdminRepository;
use crate::{
    AuditEvent, AuditLogRepository, AuditRepository, AuthorizationService, PermissionCache,
    TenantGuard,
};

mod assignments;
mod catalog;
mod operations;
mod overrides;
mod roles;

/// Application service for security administration workflows.
///
/// Every mutation checks the actor's management permission, keeps the target
/// inside the actor's tenant, invalidates affected cache entries before
/// returning and appends an audit event.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn SecurityAdminRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn SecurityAdminRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            audit_log_repository,
            audit_repository,
        }
    }

    fn cache(&self) -> &PermissionCache {
        self.authorization_service.cache()
    }

    async fn require(
        &self,
        actor: &PrincipalIdentity,
        permission: SecurityPermission,
    ) -> AppResult<()> {
        self.authorization_service
            .require_security_permission(actor, permission)
            .await
    }

    async fn ensure_target_in_actor_tenant(
        &self,
        actor: &PrincipalIdentity,
        principal_id: PrincipalId,
    ) -> AppResult<()> {
        let target_tenant = self
            .authorization_service
            .principal_tenant(principal_id)
            .await?;
        TenantGuard::ensure_same_tenant(actor.tenant_id(), target_tenant)
    }

    async fn load_active_permission(
        &self,
        permission_key: &PermissionKey,
    ) -> AppResult<PermissionDefinition> {
        let definition = self
            .repository
            .find_permission(permission_key)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_key}' does not exist"))
            })?;

        if !definition.is_active() {
            return Err(AppError::Validation(format!(
                "permission '{permission_key}' is inactive"
            )));
        }

        Ok(definition)
    }

    async fn load_role(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
    ) -> AppResult<RoleDefinition> {
        self.repository
            .find_role(actor.tenant_id(), role_key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_key}' does not exist")))
    }

    async fn load_mutable_role(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
    ) -> AppResult<RoleDefinition> {
        let role = self.load_role(actor, role_key).await?;
        if role.is_system || role.tenant_id != Some(actor.tenant_id()) {
            return Err(AppError::Forbidden(format!(
                "system role '{role_key}' cannot be modified by tenant administrators"
            )));
        }

        Ok(role)
    }

    async fn append_audit(
        &self,
        actor: &PrincipalIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                tenant_id: actor.tenant_id(),
                actor_id: actor.principal_id(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                detail: Some(detail),
            })
            .await
    }
}

#[cfg(test)]
mod tests;
