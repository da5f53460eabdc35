use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

/// Collaborator checks answer for the principal named in the body; the
/// security surface acts as the principal asserted in `x-principal-id`.
pub fn build_router(app_state: AppState) -> Router {
    let authz_routes = Router::new()
        .route(
            "/api/authz/check",
            post(handlers::authz::check_permission_handler),
        )
        .route(
            "/api/authz/check-any",
            post(handlers::authz::check_any_permission_handler),
        )
        .route(
            "/api/authz/access",
            post(handlers::authz::check_access_handler),
        )
        .route(
            "/api/authz/principals/{principal_id}/permissions",
            get(handlers::authz::effective_permissions_handler),
        )
        .route(
            "/api/authz/principals/{principal_id}/permissions/{permission}/explain",
            get(handlers::authz::explain_permission_handler),
        )
        .route(
            "/api/authz/principals/{principal_id}/tenant",
            get(handlers::authz::principal_tenant_handler),
        );

    let security_routes = Router::new()
        .route(
            "/api/security/permissions",
            get(handlers::security::list_permissions_handler)
                .post(handlers::security::register_permission_handler),
        )
        .route(
            "/api/security/permissions/{permission}/active",
            put(handlers::security::set_permission_active_handler),
        )
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/roles/{role_key}/deactivate",
            post(handlers::security::deactivate_role_handler),
        )
        .route(
            "/api/security/roles/{role_key}/activate",
            post(handlers::security::activate_role_handler),
        )
        .route(
            "/api/security/roles/{role_key}/permissions/{permission}",
            post(handlers::security::attach_role_permission_handler)
                .delete(handlers::security::detach_role_permission_handler),
        )
        .route(
            "/api/security/role-assignments",
            get(handlers::security::list_role_assignments_handler)
                .post(handlers::security::assign_role_handler)
                .delete(handlers::security::revoke_role_handler),
        )
        .route(
            "/api/security/principals/{principal_id}",
            delete(handlers::security::remove_principal_handler),
        )
        .route(
            "/api/security/principals/{principal_id}/overrides",
            get(handlers::security::list_overrides_handler),
        )
        .route(
            "/api/security/principals/{principal_id}/overrides/{permission}",
            put(handlers::security::set_override_handler)
                .delete(handlers::security::clear_override_handler),
        )
        .route(
            "/api/security/cache/rebuild",
            post(handlers::security::force_cache_rebuild_handler),
        )
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_principal,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(authz_routes)
        .merge(security_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
