use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .security_admin_service
        .list_roles(&actor)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let permissions = payload
        .permissions
        .into_iter()
        .map(PermissionKey::new)
        .collect::<Result<Vec<_>, _>>()?;

    let role = state
        .security_admin_service
        .create_role(
            &actor,
            CreateRoleInput {
                key: RoleKey::new(payload.key)?,
                display_name: payload.display_name,
                permissions,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn deactivate_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path(role_key): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .security_admin_service
        .deactivate_role(&actor, &RoleKey::new(role_key)?)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn activate_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path(role_key): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .security_admin_service
        .reactivate_role(&actor, &RoleKey::new(role_key)?)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn attach_role_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path((role_key, permission_key)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .attach_permission(
            &actor,
            &RoleKey::new(role_key)?,
            &PermissionKey::new(permission_key)?,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn detach_role_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path((role_key, permission_key)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .detach_permission(
            &actor,
            &RoleKey::new(role_key)?,
            &PermissionKey::new(permission_key)?,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
