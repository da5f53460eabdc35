use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keystone_application::{CacheEpoch, CachedPermissions, PermissionCacheStore, SnapshotEntry};
use keystone_core::{AppResult, PrincipalId};
use tokio::sync::RwLock;

type Snapshot = HashMap<PrincipalId, CachedPermissions>;

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Arc<Snapshot>,
    global_epoch: u64,
    principal_epochs: HashMap<PrincipalId, u64>,
}

impl CacheState {
    fn epoch(&self, principal_id: PrincipalId) -> CacheEpoch {
        CacheEpoch {
            global: self.global_epoch,
            principal: self
                .principal_epochs
                .get(&principal_id)
                .copied()
                .unwrap_or(0),
        }
    }
}

/// Process-local permission cache holding an immutable snapshot.
///
/// Single-entry writes copy on write; `replace_all` builds the new map before
/// taking the lock and swaps the `Arc`, so readers see one snapshot or the
/// other. Invalidation counters live under the same lock as the snapshot.
#[derive(Debug, Default)]
pub struct InMemoryPermissionCache {
    state: RwLock<CacheState>,
}

impl InMemoryPermissionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.snapshot.len()
    }

    /// Returns whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.snapshot.is_empty()
    }
}

#[async_trait]
impl PermissionCacheStore for InMemoryPermissionCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<CachedPermissions>> {
        let snapshot = Arc::clone(&self.state.read().await.snapshot);
        Ok(snapshot.get(&principal_id).cloned())
    }

    async fn epoch(&self, principal_id: PrincipalId) -> AppResult<CacheEpoch> {
        Ok(self.state.read().await.epoch(principal_id))
    }

    async fn put(&self, entry: CachedPermissions, observed: CacheEpoch) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.epoch(entry.principal_id) != observed {
            return Ok(false);
        }
        Arc::make_mut(&mut state.snapshot).insert(entry.principal_id, entry);
        Ok(true)
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        let mut state = self.state.write().await;
        *state.principal_epochs.entry(principal_id).or_insert(0) += 1;
        if state.snapshot.contains_key(&principal_id) {
            Arc::make_mut(&mut state.snapshot).remove(&principal_id);
        }
        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.global_epoch += 1;
        state.snapshot = Arc::new(Snapshot::new());
        Ok(())
    }

    async fn replace_all(&self, entries: Vec<SnapshotEntry>) -> AppResult<usize> {
        let mut next: Snapshot = HashMap::with_capacity(entries.len());
        let mut observed = HashMap::with_capacity(entries.len());
        for value in entries {
            observed.insert(value.entry.principal_id, value.observed);
            next.insert(value.entry.principal_id, value.entry);
        }

        let mut state = self.state.write().await;
        next.retain(|principal_id, _| {
            observed.get(principal_id) == Some(&state.epoch(*principal_id))
        });
        let installed = next.len();
        state.snapshot = Arc::new(next);
        Ok(installed)
    }
}
