use super::*;

use crate::security_admin_ports::CreateRoleInput;

impl SecurityAdminService {
    /// Returns tenant and system roles for administrative users.
    pub async fn list_roles(&self, actor: &PrincipalIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        self.repository.list_roles(actor.tenant_id()).await
    }

    /// Creates a tenant role and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &PrincipalIdentity,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        if input.key.is_admin() {
            return Err(AppError::Validation(format!(
                "role key '{}' is reserved",
                input.key
            )));
        }

        if input.display_name.trim().is_empty() {
            return Err(AppError::Validation(
                "role display_name must not be empty".to_owned(),
            ));
        }

        for permission_key in &input.permissions {
            self.load_active_permission(permission_key).await?;
        }

        let role = self
            .repository
            .create_role(actor.tenant_id(), actor.principal_id(), input)
            .await?;

        self.append_audit(
            actor,
            AuditAction::RoleCreated,
            "security_role",
            role.key.to_string(),
            format!(
                "created role '{}' with {} permissions",
                role.key,
                role.permissions.len()
            ),
        )
        .await?;

        Ok(role)
    }

    /// Deactivates a tenant role. Deactivating an inactive role is a no-op.
    pub async fn deactivate_role(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
    ) -> AppResult<RoleDefinition> {
        self.change_role_activation(actor, role_key, false).await
    }

    /// Reactivates a tenant role. Reactivating an active role is a no-op.
    pub async fn reactivate_role(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
    ) -> AppResult<RoleDefinition> {
        self.change_role_activation(actor, role_key, true).await
    }

    /// Attaches a catalog permission to a tenant role.
    pub async fn attach_permission(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
        permission_key: &PermissionKey,
    ) -> AppResult<()> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        let role = self.load_mutable_role(actor, role_key).await?;
        self.load_active_permission(permission_key).await?;

        let attached = self
            .repository
            .attach_permission(role.role_id, permission_key, actor.principal_id())
            .await?;
        if !attached {
            return Ok(());
        }

        self.cache().invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::RolePermissionAttached,
            "security_role_permission",
            format!("{role_key}:{permission_key}"),
            format!("attached permission '{permission_key}' to role '{role_key}'"),
        )
        .await
    }

    /// Detaches a permission from a tenant role.
    pub async fn detach_permission(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
        permission_key: &PermissionKey,
    ) -> AppResult<()> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        let role = self.load_mutable_role(actor, role_key).await?;

        let detached = self
            .repository
            .detach_permission(role.role_id, permission_key)
            .await?;
        if !detached {
            return Ok(());
        }

        self.cache().invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::RolePermissionDetached,
            "security_role_permission",
            format!("{role_key}:{permission_key}"),
            format!("detached permission '{permission_key}' from role '{role_key}'"),
        )
        .await
    }

    async fn change_role_activation(
        &self,
        actor: &PrincipalIdentity,
        role_key: &RoleKey,
        is_active: bool,
    ) -> AppResult<RoleDefinition> {
        self.require(actor, SecurityPermission::RolesManage).await?;

        let role = self.load_mutable_role(actor, role_key).await?;
        if role.is_active == is_active {
            return Ok(role);
        }

        let role = self
            .repository
            .set_role_active(role.role_id, is_active)
            .await?;

        self.cache().invalidate_all().await;

        let (action, verb) = if is_active {
            (AuditAction::RoleReactivated, "reactivated")
        } else {
            (AuditAction::RoleDeactivated, "deactivated")
        };
        self.append_audit(
            actor,
            action,
            "security_role",
            role_key.to_string(),
            format!("{verb} role '{role_key}'"),
        )
        .await?;

        Ok(role)
    }
}
