//! Short-lived, in-process cache for upstream responses.
//!
//! Entries are keyed by operation and identity and expire after a TTL.
//! Concurrent lookups of one key share a single upstream fetch: each key owns
//! an async mutex, the first caller fetches while holding it, and everyone
//! queued behind it reads the stored value. Failed fetches store nothing.
//!
//! A slot that ends up empty is removed once nobody else holds it, and every
//! miss sweeps out expired slots, so the map stays bounded by live entries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Which upstream call produced a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    ListRepositories,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::ListRepositories => "repos",
        }
    }
}

struct CachedEntry<V> {
    value: V,
    fetched_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<CachedEntry<V>>>>;

pub struct ResponseCache<V> {
    ttl: Duration,
    slots: DashMap<(CacheOperation, String), Slot<V>>,
}

impl<V: Clone + Send> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, op: CacheOperation, key: &str) -> Slot<V> {
        // Clone the Arc out so no map shard stays locked across an await.
        self.slots
            .entry((op, key.to_string()))
            .or_default()
            .value()
            .clone()
    }

    fn is_fresh(&self, entry: &CachedEntry<V>) -> bool {
        entry.fetched_at.elapsed() < self.ttl
    }

    /// Cached value for `key`, if present and fresh. Stale values are dropped.
    pub async fn get(&self, op: CacheOperation, key: &str) -> Option<V> {
        let slot = self.slots.get(&(op, key.to_string()))?.value().clone();
        let mut guard = slot.lock().await;
        match guard.as_ref() {
            Some(entry) if self.is_fresh(entry) => return Some(entry.value.clone()),
            Some(_) => {
                debug!(op = op.as_str(), key, "evicting stale cache entry");
                *guard = None;
            }
            None => {}
        }
        drop(guard);
        self.release(op, key, slot);
        None
    }

    /// Return the cached value or run `fetch` to produce it.
    ///
    /// At most one `fetch` runs per key at a time. An `Err` from `fetch` is
    /// handed back to this caller only; the next caller fetches again.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        op: CacheOperation,
        key: &str,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(op, key);
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref() {
            if self.is_fresh(entry) {
                debug!(op = op.as_str(), key, "cache hit");
                return Ok(entry.value.clone());
            }
            debug!(op = op.as_str(), key, "cache entry expired");
            *guard = None;
        }

        debug!(op = op.as_str(), key, "cache miss, fetching");
        self.purge_expired();
        match fetch().await {
            Ok(value) => {
                *guard = Some(CachedEntry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(value)
            }
            Err(err) => {
                drop(guard);
                self.release(op, key, slot);
                Err(err)
            }
        }
    }

    /// Give up our handle on an empty slot and remove it if it was the last.
    fn release(&self, op: CacheOperation, key: &str, slot: Slot<V>) {
        drop(slot);
        self.slots.remove_if(&(op, key.to_string()), |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|g| g.is_none())
        });
    }

    pub fn invalidate(&self, op: CacheOperation, key: &str) {
        self.slots.remove(&(op, key.to_string()));
    }

    /// Drop every expired or empty slot nobody is currently using.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => matches!(guard.as_ref(), Some(e) if e.fetched_at.elapsed() < ttl),
                Err(_) => true,
            }
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<V: Clone + Send> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OP: CacheOperation = CacheOperation::ListRepositories;

    #[tokio::test(start_paused = true)]
    async fn concurrent_lookups_share_one_fetch() {
        let cache = Arc::new(ResponseCache::<Vec<String>>::default());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(OP, "octocat", || async {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(vec!["hello-world".to_string()])
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec!["hello-world"]);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_refetched() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(60));
        let first = cache
            .get_or_fetch(OP, "octocat", || async { Ok::<_, ()>(1) })
            .await;
        assert_eq!(first, Ok(1));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get(OP, "octocat").await, Some(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(OP, "octocat").await, None);

        let second = cache
            .get_or_fetch(OP, "octocat", || async { Ok::<_, ()>(2) })
            .await;
        assert_eq!(second, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_not_cached() {
        let cache = ResponseCache::<u32>::default();
        let err = cache
            .get_or_fetch(OP, "octocat", || async { Err::<u32, _>("rate limited") })
            .await;
        assert_eq!(err, Err("rate limited"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(OP, "octocat").await, None);

        let ok = cache
            .get_or_fetch(OP, "octocat", || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let cache = ResponseCache::<&'static str>::default();
        cache
            .get_or_fetch(OP, "a", || async { Ok::<_, ()>("for a") })
            .await
            .unwrap();
        assert_eq!(cache.get(OP, "b").await, None);
        assert_eq!(cache.get(OP, "a").await, Some("for a"));

        cache.invalidate(OP, "a");
        assert_eq!(cache.get(OP, "a").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_expired_slots() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(10));
        cache.get_or_fetch(OP, "a", || async { Ok::<_, ()>(1) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_or_fetch(OP, "b", || async { Ok::<_, ()>(2) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(OP, "b").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_leave_no_slots() {
        let cache = ResponseCache::<u32>::default();
        for i in 0..500 {
            let res = cache
                .get_or_fetch(OP, &format!("user-{i}"), || async { Err::<u32, _>("not found") })
                .await;
            assert!(res.is_err());
        }
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reads_release_the_slot() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(10));
        cache.get_or_fetch(OP, "a", || async { Ok::<_, ()>(1) }).await.unwrap();
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get(OP, "a").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn misses_sweep_expired_slots() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(10));
        for i in 0..50 {
            cache
                .get_or_fetch(OP, &format!("user-{i}"), || async { Ok::<_, ()>(i) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 50);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.get_or_fetch(OP, "fresh", || async { Ok::<_, ()>(99) }).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(OP, "fresh").await, Some(99));
    }
}
