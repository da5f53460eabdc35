//! Permission cache contract and read-through service.
//!
//! Writes invalidate synchronously after commit and reads rebuild lazily.
//! Entries also carry `last_updated`; anything older than the configured
//! staleness bound is recomputed even if an invalidation was missed.
//!
//! Every invalidation bumps a counter in the store. Fills read the counters
//! before resolving and hand them back with the write, and the store drops
//! writes whose counters have moved. A resolve that raced a mutation can
//! therefore never put pre-mutation data back after the invalidation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keystone_core::{AppError, AppResult, PrincipalId, PrincipalIdentity, TenantId};
use keystone_domain::EffectivePermissions;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::PermissionResolver;

/// Default bound on how long an entry may serve reads.
pub const DEFAULT_MAX_STALENESS_SECONDS: i64 = 60;

/// Cached projection of one principal's resolved permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermissions {
    /// Principal the entry belongs to.
    pub principal_id: PrincipalId,
    /// Tenant the entry was resolved in.
    pub tenant_id: TenantId,
    /// Resolved permissions with provenance.
    pub permissions: EffectivePermissions,
    /// When the entry was computed.
    pub last_updated: DateTime<Utc>,
}

impl CachedPermissions {
    /// Wraps a freshly resolved set.
    #[must_use]
    pub fn new(principal: PrincipalIdentity, permissions: EffectivePermissions) -> Self {
        Self {
            principal_id: principal.principal_id(),
            tenant_id: principal.tenant_id(),
            permissions,
            last_updated: Utc::now(),
        }
    }
}

/// Invalidation counters read before a fill started resolving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEpoch {
    /// Bumped by every `invalidate_all`.
    pub global: u64,
    /// Bumped by every `invalidate` of the principal.
    pub principal: u64,
}

/// Entry computed by a full rebuild, with the counters it was resolved under.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    /// Resolved entry.
    pub entry: CachedPermissions,
    /// Counters read before resolving it.
    pub observed: CacheEpoch,
}

/// Storage port behind the permission cache.
#[async_trait]
pub trait PermissionCacheStore: Send + Sync {
    /// Returns the entry for a principal, if one exists.
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<CachedPermissions>>;

    /// Returns the invalidation counters currently recorded for a principal.
    async fn epoch(&self, principal_id: PrincipalId) -> AppResult<CacheEpoch>;

    /// Stores or replaces one entry unless the counters moved past `observed`.
    ///
    /// Returns whether the entry was written. The comparison and the write
    /// are one atomic step.
    async fn put(&self, entry: CachedPermissions, observed: CacheEpoch) -> AppResult<bool>;

    /// Bumps the principal's counter and drops its entry.
    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()>;

    /// Bumps the global counter and drops every entry.
    async fn invalidate_all(&self) -> AppResult<()>;

    /// Atomically replaces the whole snapshot.
    ///
    /// Entries whose counters moved since they were observed are left out, as
    /// is the whole snapshot when a newer one was already published.
    /// Concurrent readers observe either the previous snapshot or the new one.
    /// Returns the number of entries installed.
    async fn replace_all(&self, entries: Vec<SnapshotEntry>) -> AppResult<usize>;
}

/// Result of a cache lookup before falling back to the resolver.
#[derive(Debug)]
enum CacheLookup {
    Fresh(EffectivePermissions),
    Stale,
    Missing,
}

/// Read-through cache in front of [`PermissionResolver`].
#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn PermissionCacheStore>,
    resolver: PermissionResolver,
    max_staleness: Duration,
}

impl PermissionCache {
    /// Creates a cache service using the default staleness bound.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionCacheStore>, resolver: PermissionResolver) -> Self {
        Self {
            store,
            resolver,
            max_staleness: Duration::seconds(DEFAULT_MAX_STALENESS_SECONDS),
        }
    }

    /// Overrides the staleness bound.
    #[must_use]
    pub fn with_max_staleness(mut self, max_staleness: Duration) -> Self {
        self.max_staleness = max_staleness;
        self
    }

    /// Returns the configured staleness bound.
    #[must_use]
    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    /// Returns the resolver used on misses.
    #[must_use]
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Returns the principal's effective permissions.
    ///
    /// A miss, a stale entry or a store failure recomputes through the
    /// resolver and repopulates the store. A missing entry never means
    /// "no permissions".
    pub async fn get(&self, principal: PrincipalIdentity) -> AppResult<EffectivePermissions> {
        match self.lookup(principal).await {
            CacheLookup::Fresh(permissions) => return Ok(permissions),
            CacheLookup::Stale => debug!(
                principal_id = %principal.principal_id(),
                "permission cache entry is stale"
            ),
            CacheLookup::Missing => {}
        }

        self.rebuild_principal(principal).await
    }

    /// Returns the stored entry for a bare principal id when it can still
    /// serve reads.
    ///
    /// The entry's tenant is the binding that was verified when it was
    /// resolved. Misses, stale entries and store failures all yield `None`.
    pub async fn fresh_entry(&self, principal_id: PrincipalId) -> Option<CachedPermissions> {
        self.read(principal_id)
            .await
            .filter(|entry| self.is_fresh(entry))
    }

    /// Recomputes and stores one principal's entry.
    ///
    /// The result is always returned to the caller, but it is only written
    /// back when no invalidation landed while it was being resolved.
    pub async fn rebuild_principal(
        &self,
        principal: PrincipalIdentity,
    ) -> AppResult<EffectivePermissions> {
        let observed = match self.store.epoch(principal.principal_id()).await {
            Ok(observed) => Some(observed),
            Err(error) => {
                warn!(
                    principal_id = %principal.principal_id(),
                    error = %error,
                    "permission cache epoch read failed, result will not be stored"
                );
                None
            }
        };

        let permissions = self.resolver.resolve(principal).await?;
        let Some(observed) = observed else {
            return Ok(permissions);
        };

        match self
            .store
            .put(CachedPermissions::new(principal, permissions.clone()), observed)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(
                principal_id = %principal.principal_id(),
                "permission cache invalidated while resolving, result not stored"
            ),
            Err(error) => warn!(
                principal_id = %principal.principal_id(),
                error = %error,
                "failed to store resolved permissions"
            ),
        }

        Ok(permissions)
    }

    /// Drops one principal's entry.
    ///
    /// A store failure is logged; the entry then ages out within the
    /// staleness bound.
    pub async fn invalidate(&self, principal_id: PrincipalId) {
        if let Err(error) = self.store.invalidate(principal_id).await {
            error!(
                principal_id = %principal_id,
                error = %error,
                "failed to invalidate permission cache entry"
            );
        }
    }

    /// Drops every entry.
    pub async fn invalidate_all(&self) {
        if let Err(error) = self.store.invalidate_all().await {
            error!(error = %error, "failed to invalidate permission cache");
        }
    }

    /// Recomputes every known principal and swaps the snapshot in one step.
    ///
    /// Principals removed between listing and resolving are skipped. Any
    /// other failure leaves the previous snapshot in place. Returns the number
    /// of entries installed.
    pub async fn rebuild(&self) -> AppResult<usize> {
        let principals = self.resolver.repository().list_principals().await?;

        let mut entries = Vec::with_capacity(principals.len());
        let mut skipped = 0_usize;
        for principal in principals {
            let observed = self.store.epoch(principal.principal_id()).await?;
            match self.resolver.resolve(principal).await {
                Ok(permissions) => entries.push(SnapshotEntry {
                    entry: CachedPermissions::new(principal, permissions),
                    observed,
                }),
                Err(error @ (AppError::NotFound(_) | AppError::Unauthorized(_))) => {
                    skipped += 1;
                    debug!(
                        principal_id = %principal.principal_id(),
                        error = %error,
                        "principal left its tenant during rebuild, skipping"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        let resolved = entries.len();
        let installed = self.store.replace_all(entries).await?;
        info!(resolved, installed, skipped, "permission cache rebuilt");

        Ok(installed)
    }

    async fn read(&self, principal_id: PrincipalId) -> Option<CachedPermissions> {
        match self.store.get(principal_id).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(
                    principal_id = %principal_id,
                    error = %error,
                    "permission cache read failed, recomputing"
                );
                None
            }
        }
    }

    fn is_fresh(&self, entry: &CachedPermissions) -> bool {
        entry.permissions.model() == self.resolver.model()
            && Utc::now() - entry.last_updated <= self.max_staleness
    }

    async fn lookup(&self, principal: PrincipalIdentity) -> CacheLookup {
        let Some(entry) = self.read(principal.principal_id()).await else {
            return CacheLookup::Missing;
        };

        if entry.tenant_id == principal.tenant_id() && self.is_fresh(&entry) {
            CacheLookup::Fresh(entry.permissions)
        } else {
            CacheLookup::Stale
        }
    }
}
