use super::*;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state
        .security_admin_service
        .list_permissions(&actor)
        .await?
        .into_iter()
        .map(PermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}

pub async fn register_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Json(payload): Json<RegisterPermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = state
        .security_admin_service
        .register_permission(
            &actor,
            RegisterPermissionInput {
                key: PermissionKey::new(payload.key)?,
                description: payload.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

pub async fn set_permission_active_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path(permission_key): Path<String>,
    Json(payload): Json<SetPermissionActiveRequest>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = state
        .security_admin_service
        .set_permission_active(
            &actor,
            &PermissionKey::new(permission_key)?,
            payload.is_active,
        )
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}
