use super::*;

use crate::{AuditLogEntry, AuditLogQuery};

const MAX_AUDIT_LOG_LIMIT: usize = 500;

impl SecurityAdminService {
    /// Deletes a principal with its assignments, overrides and cache entry.
    pub async fn remove_principal(
        &self,
        actor: &PrincipalIdentity,
        principal_id: PrincipalId,
    ) -> AppResult<()> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        if principal_id == actor.principal_id() {
            return Err(AppError::Validation(
                "principals cannot remove themselves".to_owned(),
            ));
        }

        self.ensure_target_in_actor_tenant(actor, principal_id)
            .await?;

        let removed = self
            .repository
            .remove_principal(actor.tenant_id(), principal_id)
            .await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "principal '{principal_id}' does not exist"
            )));
        }

        self.cache().invalidate(principal_id).await;

        self.append_audit(
            actor,
            AuditAction::PrincipalRemoved,
            "security_principal",
            principal_id.to_string(),
            format!("removed principal '{principal_id}'"),
        )
        .await
    }

    /// Recomputes every cache entry and swaps the snapshot.
    pub async fn force_cache_rebuild(&self, actor: &PrincipalIdentity) -> AppResult<usize> {
        self.require(actor, SecurityPermission::CacheManage).await?;

        let entries = self.cache().rebuild().await?;

        self.append_audit(
            actor,
            AuditAction::CacheRebuilt,
            "security_permission_cache",
            "all".to_owned(),
            format!("rebuilt {entries} cache entries"),
        )
        .await?;

        Ok(entries)
    }

    /// Returns recent audit entries of the actor's tenant.
    pub async fn list_audit_log(
        &self,
        actor: &PrincipalIdentity,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.require(actor, SecurityPermission::AuditRead).await?;

        let query = AuditLogQuery {
            limit: query.limit.clamp(1, MAX_AUDIT_LOG_LIMIT),
            ..query
        };

        self.audit_log_repository
            .list_recent_entries(actor.tenant_id(), query)
            .await
    }
}
