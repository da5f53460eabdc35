use super::*;

pub async fn list_role_assignments_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let assignments = state
        .security_admin_service
        .list_role_assignments(&actor)
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleAssignmentResponse>)> {
    let assignment = state
        .security_admin_service
        .assign_role(
            &actor,
            AssignRoleInput {
                principal_id: payload.principal_id.parse::<PrincipalId>()?,
                role_key: RoleKey::new(payload.role_key)?,
                expires_at: parse_optional_timestamp(
                    "expires_at",
                    payload.expires_at.as_deref(),
                )?,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RoleAssignmentResponse::from(assignment)),
    ))
}

pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Json(payload): Json<RevokeRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .revoke_role(
            &actor,
            payload.principal_id.parse::<PrincipalId>()?,
            &RoleKey::new(payload.role_key)?,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
