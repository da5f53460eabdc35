use super::*;

pub async fn remove_principal_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path(principal_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .remove_principal(&actor, principal_id.parse::<PrincipalId>()?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn force_cache_rebuild_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
) -> ApiResult<Json<CacheRebuildResponse>> {
    let rebuilt = state
        .security_admin_service
        .force_cache_rebuild(&actor)
        .await?;

    Ok(Json(CacheRebuildResponse {
        rebuilt_principals: u32::try_from(rebuilt).unwrap_or(u32::MAX),
    }))
}
