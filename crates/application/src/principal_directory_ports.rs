use async_trait::async_trait;
use keystone_core::{AppResult, PrincipalIdentity, TenantId};

/// Provisioning port for the identity binding (tenant and principal rows).
///
/// The upstream gateway owns authentication; this port only records which
/// tenant a principal id belongs to.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Creates the tenant when missing.
    async fn ensure_tenant(&self, tenant_id: TenantId, name: &str) -> AppResult<()>;

    /// Binds a principal to its tenant.
    ///
    /// Registering an existing principal in the same tenant is a no-op; a
    /// principal bound to another tenant yields `Conflict`.
    async fn register_principal(
        &self,
        principal: PrincipalIdentity,
        display_name: &str,
    ) -> AppResult<()>;
}
