use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

use super::types::ClusterScope;
use crate::TARGET_CLUSTER;

/// Serializes clustering per owning scope.
///
/// A user-wide scope reads every category of the user, so it excludes all
/// of that user's category scopes. Category scopes of the same user only
/// exclude each other when they name the same category.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    users: DashMap<i64, Arc<RwLock<()>>>,
    categories: DashMap<(i64, i64), Arc<Mutex<()>>>,
}

/// Held for the whole read-compute-write sequence of one scope.
///
/// Dropping it releases the scope and forgets locks nobody else holds.
pub struct ScopeGuard<'a> {
    locks: &'a ScopeLocks,
    scope: ClusterScope,
    exclusive: Option<OwnedRwLockWriteGuard<()>>,
    shared: Option<OwnedRwLockReadGuard<()>>,
    category: Option<OwnedMutexGuard<()>>,
}

impl fmt::Debug for ScopeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard").field("scope", &self.scope).finish()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.category.take();
        self.shared.take();
        self.exclusive.take();
        self.locks.forget_unused(&self.scope);
    }
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, scope: &ClusterScope) -> ScopeGuard<'_> {
        let mut guard = ScopeGuard {
            locks: self,
            scope: *scope,
            exclusive: None,
            shared: None,
            category: None,
        };
        let user_lock = self.users.entry(scope.user_id).or_default().clone();
        match scope.category_id {
            None => {
                debug!(target: TARGET_CLUSTER, "Locking user scope {}", scope.user_id);
                guard.exclusive = Some(user_lock.write_owned().await);
            }
            Some(category_id) => {
                let category_lock = self
                    .categories
                    .entry((scope.user_id, category_id))
                    .or_default()
                    .clone();
                debug!(
                    target: TARGET_CLUSTER,
                    "Locking category scope {}/{}", scope.user_id, category_id
                );
                // always user first, then category
                guard.shared = Some(user_lock.read_owned().await);
                guard.category = Some(category_lock.lock_owned().await);
            }
        }
        guard
    }

    /// Number of user and category locks currently tracked.
    pub fn tracked(&self) -> usize {
        self.users.len() + self.categories.len()
    }

    /// The map's own reference is the last one once no guard or waiter
    /// holds the lock. Waiters clone under the shard lock, so this cannot
    /// race with them.
    fn forget_unused(&self, scope: &ClusterScope) {
        if let Some(category_id) = scope.category_id {
            self.categories
                .remove_if(&(scope.user_id, category_id), |_, lock| Arc::strong_count(lock) == 1);
        }
        self.users
            .remove_if(&scope.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
