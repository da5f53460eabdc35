use super::*;

pub async fn list_overrides_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path(principal_id): Path<String>,
) -> ApiResult<Json<Vec<OverrideResponse>>> {
    let overrides = state
        .security_admin_service
        .list_overrides(&actor, principal_id.parse::<PrincipalId>()?)
        .await?
        .into_iter()
        .map(OverrideResponse::from)
        .collect();

    Ok(Json(overrides))
}

pub async fn set_override_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path((principal_id, permission_key)): Path<(String, String)>,
    Json(payload): Json<SetOverrideRequest>,
) -> ApiResult<Json<OverrideResponse>> {
    let value = state
        .security_admin_service
        .set_override(
            &actor,
            SetOverrideInput {
                principal_id: principal_id.parse::<PrincipalId>()?,
                permission_key: PermissionKey::new(permission_key)?,
                is_granted: payload.is_granted,
                reason: payload.reason,
                expires_at: parse_optional_timestamp(
                    "expires_at",
                    payload.expires_at.as_deref(),
                )?,
            },
        )
        .await?;

    Ok(Json(OverrideResponse::from(value)))
}

pub async fn clear_override_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Path((principal_id, permission_key)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .security_admin_service
        .clear_override(
            &actor,
            principal_id.parse::<PrincipalId>()?,
            &PermissionKey::new(permission_key)?,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
