use super::*;

use crate::security_admin_ports::RegisterPermissionInput;

impl SecurityAdminService {
    /// Lists the global permission catalog.
    pub async fn list_permissions(
        &self,
        actor: &PrincipalIdentity,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.require(actor, SecurityPermission::PermissionsManage)
            .await?;

        self.repository.list_permissions().await
    }

    /// Adds a permission to the global catalog.
    pub async fn register_permission(
        &self,
        actor: &PrincipalIdentity,
        input: RegisterPermissionInput,
    ) -> AppResult<PermissionDefinition> {
        self.require(actor, SecurityPermission::PermissionsManage)
            .await?;

        let definition = self
            .repository
            .register_permission(PermissionDefinition::new(input.key, input.description))
            .await?;

        // Administrators resolve to the whole active catalog.
        self.cache().invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::PermissionRegistered,
            "security_permission",
            definition.key().to_string(),
            format!("registered permission '{}'", definition.key()),
        )
        .await?;

        Ok(definition)
    }

    /// Activates or deactivates a catalog permission.
    ///
    /// Deactivated permissions disappear from every resolved set, including
    /// administrators', while staying attached to roles.
    pub async fn set_permission_active(
        &self,
        actor: &PrincipalIdentity,
        permission_key: &PermissionKey,
        is_active: bool,
    ) -> AppResult<PermissionDefinition> {
        self.require(actor, SecurityPermission::PermissionsManage)
            .await?;

        let definition = self
            .repository
            .set_permission_active(permission_key, is_active)
            .await?;

        self.cache().invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::PermissionActivationChanged,
            "security_permission",
            permission_key.to_string(),
            format!("set permission '{permission_key}' is_active={is_active}"),
        )
        .await?;

        Ok(definition)
    }
}
