//! Keystone API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

#[cfg(test)]
mod test_support;

use keystone_core::AppError;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = match config.database_url.as_deref() {
        Some(database_url) => Some(api_services::connect_and_migrate(database_url).await?),
        None => {
            warn!("DATABASE_URL is not set, authorization data lives in process memory");
            None
        }
    };

    if config.migrate_only {
        info!("migrations completed");
        return Ok(());
    }

    let (app_state, repositories) = api_services::build_app_state(pool, &config)?;

    if config.dev_seed {
        dev_seed::run(&app_state, &repositories).await?;
    }

    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(
        %address,
        permission_model = %config.permission_model,
        cache_backend = ?config.cache_backend,
        "keystone api listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server failed: {error}")))
}
