use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use keystone_core::{AppError, PrincipalId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the principal id asserted by the upstream gateway.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Binds the calling principal to its tenant and stores the identity as a
/// request extension.
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let principal_id = request
        .headers()
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("{PRINCIPAL_HEADER} header is required")))?
        .parse::<PrincipalId>()
        .map_err(|_| AppError::Unauthorized(format!("{PRINCIPAL_HEADER} is not a valid id")))?;

    let identity = state
        .authorization_service
        .identify(principal_id)
        .await
        .map_err(|error| match error {
            AppError::NotFound(_) => {
                AppError::Unauthorized(format!("principal '{principal_id}' is not registered"))
            }
            other => other,
        })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
