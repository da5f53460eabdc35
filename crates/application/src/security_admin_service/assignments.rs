use super::*;

use chrono::Utc;
use keystone_domain::RoleAssignment;

use crate::security_admin_ports::AssignRoleInput;

impl SecurityAdminService {
    /// Assigns a role to a principal of the actor's tenant.
    ///
    /// Re-assigning an already held role refreshes its expiry.
    pub async fn assign_role(
        &self,
        actor: &PrincipalIdentity,
        input: AssignRoleInput,
    ) -> AppResult<RoleAssignment> {
        self.require(actor, SecurityPermission::RolesManage).await?;
        self.ensure_target_in_actor_tenant(actor, input.principal_id)
            .await?;

        let now = Utc::now();
        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "role assignment expires_at must be in the future".to_owned(),
            ));
        }

        let role = self.load_role(actor, &input.role_key).await?;

        let assignment = self
            .repository
            .assign_role(RoleAssignment {
                principal_id: input.principal_id,
                tenant_id: actor.tenant_id(),
                role_id: role.role_id,
                role_key: role.key.clone(),
                assigned_at: now,
                expires_at: input.expires_at,
                assigned_by: Some(actor.principal_id()),
            })
            .await?;

        self.cache().invalidate(input.principal_id).await;

        self.append_audit(
            actor,
            AuditAction::RoleAssigned,
            "security_principal_role",
            format!("{}:{}", input.principal_id, role.key),
            format!(
                "assigned role '{}' to '{}'{}",
                role.key,
                input.principal_id,
                input
                    .expires_at
                    .map(|expires_at| format!(" until {}", expires_at.to_rfc3339()))
                    .unwrap_or_default()
            ),
        )
        .await?;

        Ok(assignment)
    }

    /// Removes a role assignment from a principal of the actor's tenant.
    pub async fn revoke_role(
        &self,
        actor: &PrincipalIdentity,
        principal_id: PrincipalId,
        role_key: &RoleKey,
    ) -> AppResult<()> {
        self.require(actor, SecurityPermission::RolesManage).await?;
        self.ensure_target_in_actor_tenant(actor, principal_id)
            .await?;

        let role = self.load_role(actor, role_key).await?;

        let removed = self
            .repository
            .revoke_role(actor.tenant_id(), principal_id, role.role_id)
            .await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "principal '{principal_id}' is not assigned role '{role_key}'"
            )));
        }

        self.cache().invalidate(principal_id).await;

        self.append_audit(
            actor,
            AuditAction::RoleUnassigned,
            "security_principal_role",
            format!("{principal_id}:{role_key}"),
            format!("removed role '{role_key}' from '{principal_id}'"),
        )
        .await
    }

    /// Returns role assignments in the actor's tenant.
    pub async fn list_role_assignments(
        &self,
        actor: &PrincipalIdentity,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        self.repository
            .list_role_assignments(actor.tenant_id())
            .await
    }
}
