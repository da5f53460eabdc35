//! Redis-backed permission cache shared by every API and worker process.

use async_trait::async_trait;
use keystone_application::{CacheEpoch, CachedPermissions, PermissionCacheStore, SnapshotEntry};
use keystone_core::{AppError, AppResult, PrincipalId};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::debug;

const DEFAULT_ENTRY_TTL_SECONDS: u64 = 300;

const PUT_ENTRY_SCRIPT: &str = r#"
if tonumber(redis.call('GET', KEYS[1]) or '0') ~= tonumber(ARGV[1])
  or tonumber(redis.call('GET', KEYS[2]) or '0') ~= tonumber(ARGV[2]) then
  return 0
end
local generation = redis.call('GET', KEYS[3]) or '0'
redis.call('SET', ARGV[3] .. ':' .. generation .. ':' .. ARGV[4], ARGV[5], 'EX', ARGV[6])
return 1
"#;

const INVALIDATE_ENTRY_SCRIPT: &str = r#"
redis.call('INCR', KEYS[1])
local generation = redis.call('GET', KEYS[2]) or '0'
return redis.call('DEL', ARGV[1] .. ':' .. generation .. ':' .. ARGV[2])
"#;

const INVALIDATE_ALL_SCRIPT: &str = r#"
redis.call('INCR', KEYS[1])
local generation = redis.call('INCR', KEYS[2])
redis.call('SET', KEYS[3], generation)
return generation
"#;

// KEYS: global epoch, generation, then one principal epoch key per entry.
// ARGV: prefix, generation, then (principal, global, principal epoch) per entry.
const PUBLISH_SNAPSHOT_SCRIPT: &str = r#"
if tonumber(redis.call('GET', KEYS[2]) or '0') >= tonumber(ARGV[2]) then
  return -1
end
local global = tonumber(redis.call('GET', KEYS[1]) or '0')
local installed = 0
for index = 3, #KEYS do
  local base = (index - 2) * 3
  local current = tonumber(redis.call('GET', KEYS[index]) or '0')
  if global == tonumber(ARGV[base + 1]) and current == tonumber(ARGV[base + 2]) then
    installed = installed + 1
  else
    redis.call('DEL', ARGV[1] .. ':' .. ARGV[2] .. ':' .. ARGV[base])
  end
end
redis.call('SET', KEYS[2], ARGV[2])
return installed
"#;

/// Redis implementation of the permission cache store.
///
/// Entries live under `{prefix}:{generation}:{principal_id}`. The current
/// generation is a single key, so `invalidate_all` and `replace_all` switch
/// every reader to a new key space with one write. Published generations only
/// move forward. Orphaned generations expire through the entry TTL.
///
/// Invalidation counters live under `{prefix}:epoch` and
/// `{prefix}:epoch:{principal_id}`. Every compare-and-write runs as one Lua
/// script.
#[derive(Clone)]
pub struct RedisPermissionCache {
    client: redis::Client,
    key_prefix: String,
    entry_ttl_seconds: u64,
}

impl RedisPermissionCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            entry_ttl_seconds: DEFAULT_ENTRY_TTL_SECONDS,
        }
    }

    /// Overrides how long entries survive in Redis.
    ///
    /// Freshness is decided by the cache service from `last_updated`; the TTL
    /// only bounds memory.
    #[must_use]
    pub fn with_entry_ttl_seconds(mut self, entry_ttl_seconds: u64) -> Self {
        self.entry_ttl_seconds = entry_ttl_seconds.max(1);
        self
    }

    fn generation_key(&self) -> String {
        format!("{}:generation", self.key_prefix)
    }

    fn generation_counter_key(&self) -> String {
        format!("{}:generation_counter", self.key_prefix)
    }

    fn global_epoch_key(&self) -> String {
        format!("{}:epoch", self.key_prefix)
    }

    fn principal_epoch_key(&self, principal_id: PrincipalId) -> String {
        format!("{}:epoch:{principal_id}", self.key_prefix)
    }

    fn entry_key(&self, generation: u64, principal_id: PrincipalId) -> String {
        format!("{}:{generation}:{principal_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }

    async fn current_generation(&self, connection: &mut MultiplexedConnection) -> AppResult<u64> {
        let generation: Option<u64> =
            connection
                .get(self.generation_key())
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!(
                        "failed to read permission cache generation: {error}"
                    ))
                })?;

        Ok(generation.unwrap_or(0))
    }

    async fn reserve_generation(&self, connection: &mut MultiplexedConnection) -> AppResult<u64> {
        connection
            .incr(self.generation_counter_key(), 1_u64)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to reserve permission cache generation: {error}"
                ))
            })
    }

    async fn write_snapshot(
        &self,
        connection: &mut MultiplexedConnection,
        generation: u64,
        entries: &[SnapshotEntry],
    ) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipeline = redis::pipe();
        pipeline.atomic();
        for value in entries {
            pipeline
                .set_ex(
                    self.entry_key(generation, value.entry.principal_id),
                    encode_entry(&value.entry)?,
                    self.entry_ttl_seconds,
                )
                .ignore();
        }

        pipeline
            .query_async::<()>(connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to write permission cache snapshot: {error}"))
            })
    }

    /// Makes `generation` current unless a newer one is already published.
    ///
    /// Entries whose counters moved since they were observed are deleted from
    /// the new key space first. Returns `None` when the snapshot was
    /// superseded.
    async fn publish_snapshot(
        &self,
        connection: &mut MultiplexedConnection,
        generation: u64,
        entries: &[SnapshotEntry],
    ) -> AppResult<Option<usize>> {
        let script = Script::new(PUBLISH_SNAPSHOT_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(self.global_epoch_key())
            .key(self.generation_key())
            .arg(self.key_prefix.as_str())
            .arg(generation);
        for value in entries {
            invocation
                .key(self.principal_epoch_key(value.entry.principal_id))
                .arg(value.entry.principal_id.to_string())
                .arg(value.observed.global)
                .arg(value.observed.principal);
        }

        let installed: i64 = invocation
            .invoke_async(connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to publish permission cache generation: {error}"
                ))
            })?;

        Ok(usize::try_from(installed).ok())
    }
}

fn encode_entry(entry: &CachedPermissions) -> AppResult<String> {
    serde_json::to_string(entry).map_err(|error| {
        AppError::Internal(format!("failed to encode permission cache entry: {error}"))
    })
}

fn decode_entry(value: &str) -> AppResult<CachedPermissions> {
    serde_json::from_str(value).map_err(|error| {
        AppError::Internal(format!("invalid permission cache entry: {error}"))
    })
}

#[async_trait]
impl PermissionCacheStore for RedisPermissionCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<CachedPermissions>> {
        let mut connection = self.connection().await?;
        let generation = self.current_generation(&mut connection).await?;

        let encoded: Option<String> = connection
            .get(self.entry_key(generation, principal_id))
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to read permission cache entry: {error}"))
            })?;

        encoded.as_deref().map(decode_entry).transpose()
    }

    async fn epoch(&self, principal_id: PrincipalId) -> AppResult<CacheEpoch> {
        let mut connection = self.connection().await?;
        let (global, principal): (Option<u64>, Option<u64>) = redis::pipe()
            .get(self.global_epoch_key())
            .get(self.principal_epoch_key(principal_id))
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to read permission cache epochs: {error}"))
            })?;

        Ok(CacheEpoch {
            global: global.unwrap_or(0),
            principal: principal.unwrap_or(0),
        })
    }

    async fn put(&self, entry: CachedPermissions, observed: CacheEpoch) -> AppResult<bool> {
        let value = encode_entry(&entry)?;
        let mut connection = self.connection().await?;

        let script = Script::new(PUT_ENTRY_SCRIPT);
        let written: i32 = script
            .key(self.global_epoch_key())
            .key(self.principal_epoch_key(entry.principal_id))
            .key(self.generation_key())
            .arg(observed.global)
            .arg(observed.principal)
            .arg(self.key_prefix.as_str())
            .arg(entry.principal_id.to_string())
            .arg(value)
            .arg(self.entry_ttl_seconds)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to write permission cache entry: {error}"))
            })?;

        Ok(written == 1)
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let script = Script::new(INVALIDATE_ENTRY_SCRIPT);
        script
            .key(self.principal_epoch_key(principal_id))
            .key(self.generation_key())
            .arg(self.key_prefix.as_str())
            .arg(principal_id.to_string())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to invalidate permission cache entry: {error}"
                ))
            })?;

        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let script = Script::new(INVALIDATE_ALL_SCRIPT);
        let generation: u64 = script
            .key(self.global_epoch_key())
            .key(self.generation_counter_key())
            .key(self.generation_key())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to invalidate permission cache: {error}"))
            })?;

        debug!(generation, "permission cache generation invalidated");
        Ok(())
    }

    async fn replace_all(&self, entries: Vec<SnapshotEntry>) -> AppResult<usize> {
        let mut connection = self.connection().await?;
        let generation = self.reserve_generation(&mut connection).await?;

        self.write_snapshot(&mut connection, generation, &entries)
            .await?;

        match self
            .publish_snapshot(&mut connection, generation, &entries)
            .await?
        {
            Some(installed) => {
                debug!(
                    generation,
                    resolved = entries.len(),
                    installed,
                    "permission cache snapshot published"
                );
                Ok(installed)
            }
            None => {
                debug!(generation, "newer permission cache snapshot already published");
                Ok(0)
            }
        }
    }
}
