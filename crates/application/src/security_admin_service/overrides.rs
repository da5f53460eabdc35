use super::*;

use chrono::Utc;
use keystone_domain::PermissionOverride;

use crate::security_admin_ports::SetOverrideInput;

impl SecurityAdminService {
    /// Grants or revokes one permission for one principal.
    ///
    /// Writes upsert on (principal, permission); the last committed write wins.
    pub async fn set_override(
        &self,
        actor: &PrincipalIdentity,
        input: SetOverrideInput,
    ) -> AppResult<PermissionOverride> {
        self.require(actor, SecurityPermission::OverridesManage)
            .await?;
        self.ensure_target_in_actor_tenant(actor, input.principal_id)
            .await?;

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "override reason must not be empty".to_owned(),
            ));
        }

        let now = Utc::now();
        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "override expires_at must be in the future".to_owned(),
            ));
        }

        self.load_active_permission(&input.permission_key).await?;

        let stored = self
            .repository
            .upsert_override(PermissionOverride {
                principal_id: input.principal_id,
                tenant_id: actor.tenant_id(),
                permission_key: input.permission_key,
                is_granted: input.is_granted,
                expires_at: input.expires_at,
                reason: reason.to_owned(),
                granted_by: actor.principal_id(),
                updated_at: now,
            })
            .await?;

        self.cache().invalidate(stored.principal_id).await;

        let verb = if stored.is_granted { "granted" } else { "revoked" };
        self.append_audit(
            actor,
            AuditAction::OverrideSet,
            "security_permission_override",
            format!("{}:{}", stored.principal_id, stored.permission_key),
            format!(
                "{verb} '{}' for '{}' (reason='{}')",
                stored.permission_key, stored.principal_id, stored.reason
            ),
        )
        .await?;

        Ok(stored)
    }

    /// Deletes the override for (principal, permission).
    pub async fn clear_override(
        &self,
        actor: &PrincipalIdentity,
        principal_id: PrincipalId,
        permission_key: &PermissionKey,
    ) -> AppResult<()> {
        self.require(actor, SecurityPermission::OverridesManage)
            .await?;
        self.ensure_target_in_actor_tenant(actor, principal_id)
            .await?;

        let removed = self
            .repository
            .delete_override(actor.tenant_id(), principal_id, permission_key)
            .await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "no override for '{permission_key}' on principal '{principal_id}'"
            )));
        }

        self.cache().invalidate(principal_id).await;

        self.append_audit(
            actor,
            AuditAction::OverrideCleared,
            "security_permission_override",
            format!("{principal_id}:{permission_key}"),
            format!("cleared override '{permission_key}' for '{principal_id}'"),
        )
        .await
    }

    /// Lists stored overrides for a principal, including expired rows.
    pub async fn list_overrides(
        &self,
        actor: &PrincipalIdentity,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.require(actor, SecurityPermission::OverridesManage)
            .await?;
        self.ensure_target_in_actor_tenant(actor, principal_id)
            .await?;

        self.repository
            .list_overrides(actor.tenant_id(), principal_id)
            .await
    }
}
