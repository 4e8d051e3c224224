//! Per-identity profile records and the store contract.
//!
//! A [`ProfileRecord`] is the only durable state in codepet. Stores hand out
//! whole records and accept whole-record mutations; there is no field-level
//! write path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::streak::{map_stage, reconcile, DayKey, Stage, StreakState};

/// Persisted streak state for one tracked identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Primary (GitHub) username. Immutable.
    pub external_id: String,
    /// Secondary (LeetCode) username, overwritten on re-link.
    pub linked_secondary_id: Option<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_day: Option<DayKey>,
    /// When `last_active_day` was first credited.
    pub last_active_at: Option<DateTime<Utc>>,
    /// Distinct active days in the trailing activity window.
    pub total_activity_count: u32,
    pub stage: Stage,
    pub secondary_streak: u32,
    pub secondary_last_active_day: Option<DayKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a primary-source fetch observed for one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryObservation {
    pub active_today: bool,
    pub window_count: u32,
}

impl ProfileRecord {
    pub fn new(external_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            linked_secondary_id: None,
            current_streak: 0,
            longest_streak: 0,
            last_active_day: None,
            last_active_at: None,
            total_activity_count: 0,
            stage: Stage::Egg,
            secondary_streak: 0,
            secondary_last_active_day: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn primary_state(&self) -> StreakState {
        StreakState::new(self.current_streak, self.last_active_day)
    }

    pub fn secondary_state(&self) -> StreakState {
        StreakState::new(self.secondary_streak, self.secondary_last_active_day)
    }

    /// Fold a primary observation for `today` into the record.
    pub fn apply_primary(&mut self, today: DayKey, obs: PrimaryObservation, now: DateTime<Utc>) {
        let next = reconcile(self.primary_state(), today, obs.active_today);
        if next.last_active_day != self.last_active_day {
            self.last_active_at = Some(now);
        }
        self.current_streak = next.streak;
        self.last_active_day = next.last_active_day;
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.total_activity_count = obs.window_count;
        self.updated_at = now;
        self.refresh_stage();
    }

    /// Fold a secondary observation for `today` into the record.
    pub fn apply_secondary(&mut self, today: DayKey, active_today: bool, now: DateTime<Utc>) {
        let next = reconcile(self.secondary_state(), today, active_today);
        self.secondary_streak = next.streak;
        self.secondary_last_active_day = next.last_active_day;
        self.updated_at = now;
        self.refresh_stage();
    }

    /// Re-derive `stage` from both streaks.
    pub fn refresh_stage(&mut self) {
        self.stage = map_stage(self.current_streak, self.secondary_streak);
    }
}

/// Whole-record mutation applied atomically by a store.
pub type Mutator = Box<dyn FnOnce(&mut ProfileRecord) + Send>;

/// Atomic key-value store of profile records.
///
/// `upsert` must apply its mutator atomically relative to other mutators on
/// the same key, creating a default record stamped with `now` first when
/// none exists.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn get(&self, external_id: &str) -> Result<Option<ProfileRecord>, DatabaseError>;

    async fn upsert(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
        mutator: Mutator,
    ) -> Result<ProfileRecord, DatabaseError>;
}
