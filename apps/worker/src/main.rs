//! Keystone permission cache rebuild worker.

#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keystone_application::{
    DEFAULT_MAX_STALENESS_SECONDS, PermissionCache, PermissionCacheStore, PermissionResolver,
};
use keystone_core::{AppError, AppResult};
use keystone_domain::PermissionModel;
use keystone_infrastructure::{
    PostgresAuthorizationRepository, PostgresPermissionCache, RedisPermissionCache,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_RESOLVE_MAX_ATTEMPTS: u32 = 3;
const REDIS_KEY_PREFIX: &str = "keystone:permissions";

/// Shared cache stores the worker can refresh for other processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SharedCacheBackend {
    Redis,
    Postgres,
}

impl FromStr for SharedCacheBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "redis" => Ok(Self::Redis),
            "postgres" => Ok(Self::Postgres),
            "in_memory" => Err(AppError::Validation(
                "the worker cannot rebuild an in_memory cache owned by another process".to_owned(),
            )),
            other => Err(AppError::Validation(format!(
                "PERMISSION_CACHE_BACKEND must be 'redis' or 'postgres', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    permission_model: PermissionModel,
    cache_backend: SharedCacheBackend,
    redis_url: Option<String>,
    cache_max_staleness_seconds: i64,
    resolve_max_attempts: u32,
    rebuild_interval_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let cache = build_permission_cache(&config, pool)?;

    info!(
        permission_model = %config.permission_model,
        cache_backend = ?config.cache_backend,
        rebuild_interval_seconds = config.rebuild_interval_seconds,
        "keystone-worker started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.rebuild_interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let started = Instant::now();
        match cache.rebuild().await {
            Ok(entries) => info!(
                entries,
                elapsed_ms = started.elapsed().as_millis(),
                "permission cache rebuilt"
            ),
            Err(error) => warn!(
                error = %error,
                elapsed_ms = started.elapsed().as_millis(),
                "permission cache rebuild failed, keeping previous snapshot"
            ),
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to database: {error}")))
}

fn build_permission_cache(config: &WorkerConfig, pool: PgPool) -> AppResult<PermissionCache> {
    let store: Arc<dyn PermissionCacheStore> = match config.cache_backend {
        SharedCacheBackend::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Validation(
                    "REDIS_URL is required when PERMISSION_CACHE_BACKEND=redis".to_owned(),
                )
            })?;
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisPermissionCache::new(client, REDIS_KEY_PREFIX))
        }
        SharedCacheBackend::Postgres => Arc::new(PostgresPermissionCache::new(pool.clone())),
    };

    let resolver = PermissionResolver::new(
        Arc::new(PostgresAuthorizationRepository::new(pool)),
        config.permission_model,
    )
    .with_max_attempts(config.resolve_max_attempts);

    Ok(PermissionCache::new(store, resolver).with_max_staleness(chrono::Duration::seconds(
        config.cache_max_staleness_seconds,
    )))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = optional_non_empty_env("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let permission_model = match optional_non_empty_env("PERMISSION_MODEL") {
            Some(value) => value.parse::<PermissionModel>()?,
            None => PermissionModel::RolesAndOverrides,
        };

        let cache_backend = optional_non_empty_env("PERMISSION_CACHE_BACKEND")
            .ok_or_else(|| {
                AppError::Validation(
                    "PERMISSION_CACHE_BACKEND must name a shared cache ('redis' or 'postgres')"
                        .to_owned(),
                )
            })?
            .parse::<SharedCacheBackend>()?;

        let cache_max_staleness_seconds = parse_env_or(
            "PERMISSION_CACHE_MAX_STALENESS_SECONDS",
            DEFAULT_MAX_STALENESS_SECONDS,
        )?;
        let default_interval = u64::try_from(cache_max_staleness_seconds).unwrap_or(0);

        let config = Self {
            database_url,
            permission_model,
            cache_backend,
            redis_url: optional_non_empty_env("REDIS_URL"),
            cache_max_staleness_seconds,
            resolve_max_attempts: parse_env_or(
                "PERMISSION_RESOLVE_MAX_ATTEMPTS",
                DEFAULT_RESOLVE_MAX_ATTEMPTS,
            )?,
            rebuild_interval_seconds: parse_env_or(
                "WORKER_REBUILD_INTERVAL_SECONDS",
                default_interval,
            )?,
        };
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.cache_max_staleness_seconds <= 0 {
            return Err(AppError::Validation(
                "PERMISSION_CACHE_MAX_STALENESS_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if self.rebuild_interval_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_REBUILD_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if self.cache_backend == SharedCacheBackend::Redis && self.redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required when PERMISSION_CACHE_BACKEND=redis".to_owned(),
            ));
        }

        Ok(())
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn optional_non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_non_empty_env(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
