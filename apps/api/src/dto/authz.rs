use keystone_domain::PermissionDecision;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for a single permission check.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/permission-check-request.ts"
)]
pub struct PermissionCheckRequest {
    pub principal_id: String,
    pub permission: String,
}

/// Incoming payload for an any-of permission check.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/any-permission-check-request.ts"
)]
pub struct AnyPermissionCheckRequest {
    pub principal_id: String,
    pub permissions: Vec<String>,
}

/// Incoming payload for a tenant-scoped resource access check.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/access-check-request.ts"
)]
pub struct AccessCheckRequest {
    pub principal_id: String,
    pub resource_tenant_id: String,
    pub permission: String,
}

/// Uniform collaborator answer; denial carries no reason.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/access-decision-response.ts"
)]
pub struct AccessDecisionResponse {
    pub allowed: bool,
}

/// Effective permission keys of one principal, sorted.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/effective-permissions-response.ts"
)]
pub struct EffectivePermissionsResponse {
    pub principal_id: String,
    pub permissions: Vec<String>,
}

/// Tenant binding of one principal.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/principal-tenant-response.ts"
)]
pub struct PrincipalTenantResponse {
    pub principal_id: String,
    pub tenant_id: String,
}

/// Decision for one permission together with the source that produced it.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/permission-explanation-response.ts"
)]
pub struct PermissionExplanationResponse {
    pub permission: String,
    pub allowed: bool,
    pub source: Option<String>,
}

impl PermissionExplanationResponse {
    pub fn new(permission: String, decision: PermissionDecision) -> Self {
        Self {
            permission,
            allowed: decision.allowed,
            source: decision.source.map(|source| source.as_str().to_owned()),
        }
    }
}
