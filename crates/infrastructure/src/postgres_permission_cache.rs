use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::{CacheEpoch, CachedPermissions, PermissionCacheStore, SnapshotEntry};
use keystone_core::{AppError, AppResult, PrincipalId};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::postgres_errors::database_error;

const GLOBAL_SCOPE: &str = "global";

/// PostgreSQL-backed permission cache stored in `effective_permission_cache`.
///
/// Besides the authoritative JSON payload each row keeps the flat key list and
/// the admin flag for ad-hoc inspection. Invalidation counters live in
/// `permission_cache_epochs`, one row per principal plus a `global` row.
/// Writes take share locks on the counter rows they compare against and
/// invalidations update them, so the two serialize.
#[derive(Clone)]
pub struct PostgresPermissionCache {
    pool: PgPool,
}

impl PostgresPermissionCache {
    /// Creates a cache store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CacheRow {
    payload: String,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct EpochRow {
    scope: String,
    epoch: i64,
}

type Epochs = HashMap<String, u64>;

fn principal_scope(principal_id: PrincipalId) -> String {
    principal_id.to_string()
}

fn collect_epochs(rows: Vec<EpochRow>) -> Epochs {
    rows.into_iter()
        .map(|row| (row.scope, u64::try_from(row.epoch).unwrap_or_default()))
        .collect()
}

fn epoch_of(epochs: &Epochs, principal_id: PrincipalId) -> CacheEpoch {
    CacheEpoch {
        global: epochs.get(GLOBAL_SCOPE).copied().unwrap_or_default(),
        principal: epochs
            .get(&principal_scope(principal_id))
            .copied()
            .unwrap_or_default(),
    }
}

/// Share-locks the counter rows for `scopes`, creating missing ones at zero.
async fn lock_epochs(
    transaction: &mut Transaction<'_, Postgres>,
    scopes: Vec<String>,
) -> AppResult<Epochs> {
    sqlx::query(
        r#"
        INSERT INTO permission_cache_epochs (scope, epoch)
        SELECT scope, 0
        FROM UNNEST($1::TEXT[]) AS scope
        ON CONFLICT (scope) DO NOTHING
        "#,
    )
    .bind(scopes.as_slice())
    .execute(&mut **transaction)
    .await
    .map_err(|error| database_error("failed to seed permission cache epochs", error))?;

    let rows = sqlx::query_as::<_, EpochRow>(
        r#"
        SELECT scope, epoch
        FROM permission_cache_epochs
        WHERE scope = ANY($1)
        ORDER BY scope
        FOR SHARE
        "#,
    )
    .bind(scopes.as_slice())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| database_error("failed to lock permission cache epochs", error))?;

    Ok(collect_epochs(rows))
}

async fn bump_epoch(transaction: &mut Transaction<'_, Postgres>, scope: &str) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO permission_cache_epochs (scope, epoch)
        VALUES ($1, 1)
        ON CONFLICT (scope) DO UPDATE
        SET epoch = permission_cache_epochs.epoch + 1
        "#,
    )
    .bind(scope)
    .execute(&mut **transaction)
    .await
    .map_err(|error| database_error("failed to bump permission cache epoch", error))?;

    Ok(())
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| database_error("failed to begin transaction", error))
}

async fn commit(transaction: Transaction<'_, Postgres>, context: &str) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| database_error(context, error))
}

fn decode_row(row: CacheRow) -> AppResult<CachedPermissions> {
    let mut entry: CachedPermissions =
        serde_json::from_str(row.payload.as_str()).map_err(|error| {
            AppError::Internal(format!("invalid permission cache payload: {error}"))
        })?;
    entry.last_updated = row.last_updated;
    Ok(entry)
}

async fn insert_entry(
    transaction: &mut Transaction<'_, Postgres>,
    entry: &CachedPermissions,
) -> AppResult<()> {
    let payload = serde_json::to_string(entry).map_err(|error| {
        AppError::Internal(format!("failed to encode permission cache payload: {error}"))
    })?;
    let permission_keys: Vec<String> = entry
        .permissions
        .to_sorted_keys()
        .into_iter()
        .map(String::from)
        .collect();

    sqlx::query(
        r#"
        INSERT INTO effective_permission_cache (
            principal_id,
            tenant_id,
            permission_keys,
            is_admin,
            payload,
            last_updated
        )
        VALUES ($1, $2, $3, $4, $5::JSONB, $6)
        ON CONFLICT (principal_id) DO UPDATE
        SET tenant_id = EXCLUDED.tenant_id,
            permission_keys = EXCLUDED.permission_keys,
            is_admin = EXCLUDED.is_admin,
            payload = EXCLUDED.payload,
            last_updated = EXCLUDED.last_updated
        "#,
    )
    .bind(entry.principal_id.as_uuid())
    .bind(entry.tenant_id.as_uuid())
    .bind(permission_keys)
    .bind(entry.permissions.is_admin())
    .bind(payload)
    .bind(entry.last_updated)
    .execute(&mut **transaction)
    .await
    .map_err(|error| database_error("failed to write permission cache entry", error))?;

    Ok(())
}

#[async_trait]
impl PermissionCacheStore for PostgresPermissionCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<CachedPermissions>> {
        let row = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT payload::TEXT AS payload, last_updated
            FROM effective_permission_cache
            WHERE principal_id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to read permission cache entry", error))?;

        row.map(decode_row).transpose()
    }

    async fn epoch(&self, principal_id: PrincipalId) -> AppResult<CacheEpoch> {
        let rows = sqlx::query_as::<_, EpochRow>(
            r#"
            SELECT scope, epoch
            FROM permission_cache_epochs
            WHERE scope = ANY($1)
            "#,
        )
        .bind(vec![principal_scope(principal_id), GLOBAL_SCOPE.to_owned()])
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to read permission cache epochs", error))?;

        Ok(epoch_of(&collect_epochs(rows), principal_id))
    }

    async fn put(&self, entry: CachedPermissions, observed: CacheEpoch) -> AppResult<bool> {
        let mut transaction = begin(&self.pool).await?;

        let epochs = lock_epochs(
            &mut transaction,
            vec![principal_scope(entry.principal_id), GLOBAL_SCOPE.to_owned()],
        )
        .await?;
        if epoch_of(&epochs, entry.principal_id) != observed {
            commit(transaction, "failed to release permission cache epochs").await?;
            return Ok(false);
        }

        insert_entry(&mut transaction, &entry).await?;
        commit(transaction, "failed to commit transaction").await?;
        Ok(true)
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        bump_epoch(&mut transaction, principal_scope(principal_id).as_str()).await?;

        sqlx::query(
            r#"
            DELETE FROM effective_permission_cache
            WHERE principal_id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| database_error("failed to invalidate permission cache entry", error))?;

        commit(transaction, "failed to commit permission cache invalidation").await
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        bump_epoch(&mut transaction, GLOBAL_SCOPE).await?;

        sqlx::query("DELETE FROM effective_permission_cache")
            .execute(&mut *transaction)
            .await
            .map_err(|error| database_error("failed to invalidate permission cache", error))?;

        commit(transaction, "failed to commit permission cache invalidation").await
    }

    async fn replace_all(&self, entries: Vec<SnapshotEntry>) -> AppResult<usize> {
        let mut transaction = begin(&self.pool).await?;

        let scopes = entries
            .iter()
            .map(|value| principal_scope(value.entry.principal_id))
            .chain(std::iter::once(GLOBAL_SCOPE.to_owned()))
            .collect();
        let epochs = lock_epochs(&mut transaction, scopes).await?;

        sqlx::query("DELETE FROM effective_permission_cache")
            .execute(&mut *transaction)
            .await
            .map_err(|error| database_error("failed to clear permission cache", error))?;

        let mut installed = 0;
        for value in &entries {
            if epoch_of(&epochs, value.entry.principal_id) != value.observed {
                continue;
            }
            insert_entry(&mut transaction, &value.entry).await?;
            installed += 1;
        }

        commit(transaction, "failed to commit permission cache rebuild").await?;
        Ok(installed)
    }
}
