use axum::Json;
use axum::extract::{Path, Query, State};
use keystone_core::{AppError, PrincipalId, TenantId};
use serde::Deserialize;
use tracing::debug;

use crate::dto::{
    AccessCheckRequest, AccessDecisionResponse, AnyPermissionCheckRequest,
    EffectivePermissionsResponse, PermissionCheckRequest, PermissionExplanationResponse,
    PrincipalTenantResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EffectivePermissionsQuery {
    /// Resolve from source data instead of the cache.
    #[serde(default)]
    pub direct: bool,
}

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Json(payload): Json<PermissionCheckRequest>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let Ok(principal_id) = payload.principal_id.parse::<PrincipalId>() else {
        return Ok(Json(AccessDecisionResponse { allowed: false }));
    };

    let allowed = state
        .authorization_service
        .has_permission(principal_id, payload.permission.as_str())
        .await?;

    Ok(Json(AccessDecisionResponse { allowed }))
}

pub async fn check_any_permission_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnyPermissionCheckRequest>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let Ok(principal_id) = payload.principal_id.parse::<PrincipalId>() else {
        return Ok(Json(AccessDecisionResponse { allowed: false }));
    };

    let permission_keys: Vec<&str> = payload.permissions.iter().map(String::as_str).collect();
    let allowed = state
        .authorization_service
        .has_any_permission(principal_id, permission_keys.as_slice())
        .await?;

    Ok(Json(AccessDecisionResponse { allowed }))
}

pub async fn check_access_handler(
    State(state): State<AppState>,
    Json(payload): Json<AccessCheckRequest>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let (Ok(principal_id), Ok(resource_tenant)) = (
        payload.principal_id.parse::<PrincipalId>(),
        payload.resource_tenant_id.parse::<TenantId>(),
    ) else {
        return Ok(Json(AccessDecisionResponse { allowed: false }));
    };

    let decision = state
        .authorization_service
        .authorize(principal_id, resource_tenant, payload.permission.as_str())
        .await?;
    debug!(
        principal_id = %principal_id,
        resource_tenant = %resource_tenant,
        permission = %payload.permission,
        ?decision,
        "access check evaluated"
    );

    Ok(Json(AccessDecisionResponse {
        allowed: decision.is_allowed(),
    }))
}

pub async fn effective_permissions_handler(
    State(state): State<AppState>,
    Path(raw_principal_id): Path<String>,
    Query(query): Query<EffectivePermissionsQuery>,
) -> ApiResult<Json<EffectivePermissionsResponse>> {
    let Ok(principal_id) = raw_principal_id.parse::<PrincipalId>() else {
        return Ok(Json(EffectivePermissionsResponse {
            principal_id: raw_principal_id,
            permissions: Vec::new(),
        }));
    };

    let permissions = if query.direct {
        state
            .authorization_service
            .resolve_direct(principal_id)
            .await
            .map(|permissions| permissions.to_sorted_keys())
    } else {
        state
            .authorization_service
            .effective_permissions(principal_id)
            .await
    };

    let permissions = match permissions {
        Ok(permissions) => permissions.into_iter().map(String::from).collect(),
        Err(AppError::NotFound(_)) => Vec::new(),
        Err(error) => return Err(error.into()),
    };

    Ok(Json(EffectivePermissionsResponse {
        principal_id: principal_id.to_string(),
        permissions,
    }))
}

pub async fn principal_tenant_handler(
    State(state): State<AppState>,
    Path(principal_id): Path<String>,
) -> ApiResult<Json<PrincipalTenantResponse>> {
    let principal_id = principal_id.parse::<PrincipalId>()?;
    let tenant_id = state
        .authorization_service
        .principal_tenant(principal_id)
        .await?;

    Ok(Json(PrincipalTenantResponse {
        principal_id: principal_id.to_string(),
        tenant_id: tenant_id.to_string(),
    }))
}

pub async fn explain_permission_handler(
    State(state): State<AppState>,
    Path((principal_id, permission)): Path<(String, String)>,
) -> ApiResult<Json<PermissionExplanationResponse>> {
    let Ok(principal_id) = principal_id.parse::<PrincipalId>() else {
        return Ok(Json(PermissionExplanationResponse {
            permission,
            allowed: false,
            source: None,
        }));
    };

    match state
        .authorization_service
        .explain(principal_id, permission.as_str())
        .await
    {
        Ok(decision) => Ok(Json(PermissionExplanationResponse::new(
            permission, decision,
        ))),
        Err(AppError::NotFound(_)) => Ok(Json(PermissionExplanationResponse {
            permission,
            allowed: false,
            source: None,
        })),
        Err(error) => Err(error.into()),
    }
}
