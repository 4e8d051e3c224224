//! In-memory profile store for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::profile::{Mutator, ProfileRecord, ProfileStore};
use crate::error::DatabaseError;

/// Process-local [`ProfileStore`]. A single write lock makes every upsert atomic.
#[derive(Default)]
pub struct MemoryProfileStore {
    records: RwLock<HashMap<String, ProfileRecord>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backing store going away.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of committed upserts.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed a record directly, bypassing mutators.
    pub async fn insert(&self, record: ProfileRecord) {
        self.records
            .write()
            .await
            .insert(record.external_id.clone(), record);
    }

    fn check_online(&self) -> Result<(), DatabaseError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_online()
    }

    async fn get(&self, external_id: &str) -> Result<Option<ProfileRecord>, DatabaseError> {
        self.check_online()?;
        Ok(self.records.read().await.get(external_id).cloned())
    }

    async fn upsert(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
        mutator: Mutator,
    ) -> Result<ProfileRecord, DatabaseError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        let mut record = records
            .get(external_id)
            .cloned()
            .unwrap_or_else(|| ProfileRecord::new(external_id, now));
        mutator(&mut record);
        records.insert(external_id.to_string(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn upsert_creates_then_mutates() {
        let store = MemoryProfileStore::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        assert!(store.get("octocat").await.unwrap().is_none());

        let rec = store
            .upsert("octocat", now, Box::new(|r| r.current_streak = 3))
            .await
            .unwrap();
        assert_eq!(rec.current_streak, 3);
        assert_eq!(rec.created_at, now);

        let later = now + chrono::Duration::days(1);
        let rec = store
            .upsert("octocat", later, Box::new(|r| r.current_streak += 1))
            .await
            .unwrap();
        assert_eq!(rec.current_streak, 4);
        assert_eq!(rec.created_at, now);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn offline_store_rejects_everything() {
        let store = MemoryProfileStore::new();
        store.set_offline(true);
        assert!(matches!(store.ping().await, Err(DatabaseError::Unavailable(_))));
        assert!(store.get("octocat").await.is_err());
        assert!(store
            .upsert("octocat", Utc::now(), Box::new(|_| {}))
            .await
            .is_err());
        assert_eq!(store.write_count(), 0);
    }
}
