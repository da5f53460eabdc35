use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use keystone_application::DEFAULT_MAX_STALENESS_SECONDS;
use keystone_core::AppError;
use keystone_domain::PermissionModel;
use tracing_subscriber::EnvFilter;

const DEFAULT_RESOLVE_MAX_ATTEMPTS: u32 = 3;

/// Storage used for resolved permission snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    InMemory,
    Redis,
    Postgres,
}

impl FromStr for CacheBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "in_memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            "postgres" => Ok(Self::Postgres),
            other => Err(AppError::Validation(format!(
                "PERMISSION_CACHE_BACKEND must be one of 'in_memory', 'redis' or 'postgres', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub permission_model: PermissionModel,
    pub cache_backend: CacheBackend,
    pub redis_url: Option<String>,
    pub cache_max_staleness_seconds: i64,
    pub resolve_max_attempts: u32,
    pub dev_seed: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = optional_non_empty_env("DATABASE_URL");
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let permission_model = match optional_non_empty_env("PERMISSION_MODEL") {
            Some(value) => value.parse::<PermissionModel>()?,
            None => PermissionModel::RolesAndOverrides,
        };

        let cache_backend = env::var("PERMISSION_CACHE_BACKEND")
            .unwrap_or_else(|_| "in_memory".to_owned())
            .parse::<CacheBackend>()?;
        let redis_url = optional_non_empty_env("REDIS_URL");

        let cache_max_staleness_seconds = parse_env_or(
            "PERMISSION_CACHE_MAX_STALENESS_SECONDS",
            DEFAULT_MAX_STALENESS_SECONDS,
        )?;
        if cache_max_staleness_seconds <= 0 {
            return Err(AppError::Validation(
                "PERMISSION_CACHE_MAX_STALENESS_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let resolve_max_attempts =
            parse_env_or("PERMISSION_RESOLVE_MAX_ATTEMPTS", DEFAULT_RESOLVE_MAX_ATTEMPTS)?;

        let dev_seed = env::var("DEV_SEED")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let config = Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            permission_model,
            cache_backend,
            redis_url,
            cache_max_staleness_seconds,
            resolve_max_attempts,
            dev_seed,
        };
        config.validate()?;

        Ok(config)
    }

    /// Rejects combinations that cannot be wired.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.migrate_only && self.database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        match self.cache_backend {
            CacheBackend::Redis if self.redis_url.is_none() => Err(AppError::Validation(
                "REDIS_URL is required when PERMISSION_CACHE_BACKEND=redis".to_owned(),
            )),
            CacheBackend::Postgres if self.database_url.is_none() => {
                Err(AppError::Validation(
                    "DATABASE_URL is required when PERMISSION_CACHE_BACKEND=postgres".to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
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

fn parse_env_or<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_non_empty_env(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}
