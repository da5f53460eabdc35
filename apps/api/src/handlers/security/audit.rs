use super::*;

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<PrincipalIdentity>,
    Query(params): Query<AuditLogParams>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let defaults = AuditLogQuery::default();
    let actor_id = params
        .actor_id
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(str::parse::<PrincipalId>)
        .transpose()?;

    let entries = state
        .security_admin_service
        .list_audit_log(
            &actor,
            AuditLogQuery {
                limit: params.limit.unwrap_or(defaults.limit),
                offset: params.offset.unwrap_or(defaults.offset),
                action: params.action.filter(|value| !value.trim().is_empty()),
                actor_id,
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
