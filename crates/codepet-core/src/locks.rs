//! Per-identity writer locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes work on one identity while letting different identities run
/// in parallel.
///
/// Entries are created on first use. The last guard out removes its entry,
/// so the map only holds identities that are locked or being waited on.
#[derive(Default)]
pub struct IdentityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one identity. Dropping it releases the lock.
pub struct IdentityGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the mutex, so a count of one means
        // only the map still refers to it.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> IdentityGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        IdentityGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
