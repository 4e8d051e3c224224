//! Reconciliation orchestrator.
//!
//! Sequences one pass for one identity: load the stored record, ask the
//! selected source what happened in the activity window, fold the answer
//! into the streak, and persist the whole record in a single upsert. Any
//! failure before that upsert leaves the stored record untouched.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::{CacheOperation, ResponseCache};
use crate::error::{CoreError, DatabaseError, Result, SourceError, ValidationError};
use crate::locks::IdentityLocks;
use crate::sources::{PrimarySource, RepoSummary, SecondarySource, SubmissionCalendar};
use crate::storage::{Config, PrimaryObservation, ProfileRecord, ProfileStore};
use crate::streak::{normalize, DayKey, Stage};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACTIVITY_WINDOW_DAYS: u32 = 30;

/// Which activity source a reconciliation pass reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    Primary,
    Secondary,
}

impl SourceSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSelector::Primary => "primary",
            SourceSelector::Secondary => "secondary",
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub external_id: String,
    pub source: SourceSelector,
    pub current_streak: u32,
    pub secondary_streak: u32,
    pub longest_streak: u32,
    pub stage: Stage,
    pub total_activity_count: u32,
    pub last_active_day: Option<DayKey>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl ReconciliationResult {
    fn from_record(record: &ProfileRecord, source: SourceSelector) -> Self {
        Self {
            external_id: record.external_id.clone(),
            source,
            current_streak: record.current_streak,
            secondary_streak: record.secondary_streak,
            longest_streak: record.longest_streak,
            stage: record.stage,
            total_activity_count: record.total_activity_count,
            last_active_day: record.last_active_day,
            last_active_at: record.last_active_at,
            message: record.stage.message().to_string(),
        }
    }
}

/// Secondary-source stats after a secondary reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryStatsResult {
    /// The linked secondary username.
    pub username: String,
    pub total_solved: u32,
    pub easy_solved: u32,
    pub medium_solved: u32,
    pub hard_solved: u32,
    pub current_streak: u32,
    /// Longest run anywhere in the provider calendar. Informational only.
    pub longest_streak: u32,
    pub last_active_day: Option<DayKey>,
    pub solved_today: bool,
    pub todays_submission_count: u32,
    pub stage: Stage,
    pub message: String,
}

/// Acknowledgement of a secondary link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAck {
    pub external_id: String,
    pub linked_secondary_id: String,
    /// Whether a different account was linked before.
    pub replaced: bool,
}

/// Cached repository listing for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListing {
    pub username: String,
    pub repos: Vec<RepoSummary>,
    pub fetched_at: DateTime<Utc>,
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier pattern is valid"))
}

/// Check an identifier is present and uses only letters, digits, `-` and `_`.
pub fn validate_identifier(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing(field.to_string()));
    }
    if !identifier_pattern().is_match(value) {
        return Err(ValidationError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn submission_message(count: u32) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("You have {count} accepted submission{plural} today!")
}

/// Store failures on the read path mean the store is unreachable.
fn unavailable(err: DatabaseError) -> CoreError {
    CoreError::Unavailable(err.to_string())
}

fn write_failed(err: DatabaseError) -> CoreError {
    match err {
        DatabaseError::Unavailable(msg) => CoreError::Unavailable(msg),
        DatabaseError::OpenFailed { .. } => CoreError::Unavailable(err.to_string()),
        other => CoreError::Database(other),
    }
}

pub struct ReconciliationOrchestrator {
    primary: Arc<dyn PrimarySource>,
    secondary: Arc<dyn SecondarySource>,
    store: Arc<dyn ProfileStore>,
    listings: ResponseCache<RepoListing>,
    locks: IdentityLocks,
    timeout: Duration,
    window_days: u32,
}

impl ReconciliationOrchestrator {
    pub fn new(
        primary: Arc<dyn PrimarySource>,
        secondary: Arc<dyn SecondarySource>,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            primary,
            secondary,
            store,
            listings: ResponseCache::default(),
            locks: IdentityLocks::new(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            window_days: DEFAULT_ACTIVITY_WINDOW_DAYS,
        }
    }

    /// Build with timeout, window and cache TTL taken from `config`.
    pub fn from_config(
        config: &Config,
        primary: Arc<dyn PrimarySource>,
        secondary: Arc<dyn SecondarySource>,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        Self::new(primary, secondary, store)
            .with_timeout(config.upstream_timeout())
            .with_activity_window(config.upstream.activity_window_days)
            .with_cache_ttl(config.cache_ttl())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_activity_window(mut self, days: u32) -> Self {
        self.window_days = days.max(1);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.listings = ResponseCache::new(ttl);
        self
    }

    /// Reconcile the primary source for `external_id` as of now.
    pub async fn get_or_create_profile(&self, external_id: &str) -> Result<ReconciliationResult> {
        self.reconcile(external_id, SourceSelector::Primary, Utc::now())
            .await
    }

    /// Run one reconciliation pass for `external_id` against `source`.
    pub async fn reconcile(
        &self,
        external_id: &str,
        source: SourceSelector,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationResult> {
        let span = info_span!("reconcile", id = external_id, source = source.as_str());
        async move {
            validate_identifier("external_id", external_id)?;
            let record = match source {
                SourceSelector::Primary => self.reconcile_primary(external_id, now).await?,
                SourceSelector::Secondary => {
                    self.reconcile_secondary(external_id, now).await?.0
                }
            };
            info!(
                streak = record.current_streak,
                secondary_streak = record.secondary_streak,
                stage = record.stage.as_str(),
                "reconciled"
            );
            Ok(ReconciliationResult::from_record(&record, source))
        }
        .instrument(span)
        .await
    }

    /// Reconcile the secondary source and report provider stats.
    pub async fn get_secondary_stats(&self, external_id: &str) -> Result<SecondaryStatsResult> {
        self.get_secondary_stats_at(external_id, Utc::now()).await
    }

    pub async fn get_secondary_stats_at(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SecondaryStatsResult> {
        let span = info_span!("secondary_stats", id = external_id);
        async move {
            validate_identifier("external_id", external_id)?;
            let (record, calendar) = self.reconcile_secondary(external_id, now).await?;
            let today = DayKey::from_timestamp(&now);
            let todays = calendar.count_on(today);

            Ok(SecondaryStatsResult {
                username: record.linked_secondary_id.clone().unwrap_or_default(),
                total_solved: calendar.solved.all,
                easy_solved: calendar.solved.easy,
                medium_solved: calendar.solved.medium,
                hard_solved: calendar.solved.hard,
                current_streak: record.secondary_streak,
                longest_streak: calendar.longest_run(),
                last_active_day: calendar.last_active_day(),
                solved_today: todays > 0,
                todays_submission_count: todays,
                stage: record.stage,
                message: submission_message(todays),
            })
        }
        .instrument(span)
        .await
    }

    /// Link (or re-link) a secondary account to `external_id`.
    ///
    /// Creates the record when it does not exist yet. Re-linking to a
    /// different account clears the secondary streak.
    pub async fn link_secondary_source(
        &self,
        external_id: &str,
        secondary_id: &str,
    ) -> Result<LinkAck> {
        validate_identifier("external_id", external_id)?;
        validate_identifier("secondary_id", secondary_id)?;

        let _guard = self.locks.acquire(external_id).await;
        let previous = self
            .store
            .get(external_id)
            .await
            .map_err(unavailable)?
            .and_then(|r| r.linked_secondary_id);

        let linked = secondary_id.to_string();
        let now = Utc::now();
        let record = self
            .store
            .upsert(
                external_id,
                now,
                Box::new(move |rec| {
                    if rec.linked_secondary_id.as_deref() != Some(linked.as_str()) {
                        rec.secondary_streak = 0;
                        rec.secondary_last_active_day = None;
                    }
                    rec.linked_secondary_id = Some(linked);
                    rec.updated_at = now;
                    rec.refresh_stage();
                }),
            )
            .await
            .map_err(write_failed)?;

        let replaced = previous.is_some_and(|p| p != secondary_id);
        info!(id = external_id, secondary = secondary_id, replaced, "linked secondary account");
        Ok(LinkAck {
            external_id: record.external_id,
            linked_secondary_id: secondary_id.to_string(),
            replaced,
        })
    }

    /// Repositories for `external_id`, served from the listing cache when fresh.
    pub async fn list_recent_items(&self, external_id: &str) -> Result<RepoListing> {
        validate_identifier("external_id", external_id)?;
        let service = self.primary.name().to_string();
        self.listings
            .get_or_fetch(CacheOperation::ListRepositories, external_id, || async {
                self.bounded(&service, self.primary.verify_identity(external_id))
                    .await?;
                let repos = self
                    .bounded(&service, self.primary.list_repositories(external_id))
                    .await?;
                Ok::<_, CoreError>(RepoListing {
                    username: external_id.to_string(),
                    repos,
                    fetched_at: Utc::now(),
                })
            })
            .await
    }

    async fn bounded<T, F>(&self, service: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, SourceError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| e.into_core(service)),
            Err(_) => Err(CoreError::upstream(
                service,
                format!("timed out after {}s", self.timeout.as_secs_f32()),
            )),
        }
    }

    async fn load(&self, external_id: &str) -> Result<Option<ProfileRecord>> {
        self.store.get(external_id).await.map_err(unavailable)
    }

    async fn reconcile_primary(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProfileRecord> {
        let _guard = self.locks.acquire(external_id).await;
        // Reachability first: an unreachable store must cost no upstream calls.
        self.store.ping().await.map_err(unavailable)?;

        let today = DayKey::from_timestamp(&now);
        let obs = self.observe_primary(external_id, today).await?;
        debug!(active_today = obs.active_today, window_count = obs.window_count, "primary observation");

        self.store
            .upsert(
                external_id,
                now,
                Box::new(move |rec| rec.apply_primary(today, obs, now)),
            )
            .await
            .map_err(write_failed)
    }

    async fn observe_primary(&self, external_id: &str, today: DayKey) -> Result<PrimaryObservation> {
        let service = self.primary.name().to_string();
        // The window is `window_days` days inclusive of today.
        let since = today.minus_days(u64::from(self.window_days) - 1);

        self.bounded(&service, self.primary.verify_identity(external_id))
            .await?;

        let mut days = BTreeSet::new();
        match self
            .bounded(&service, self.primary.search_activity(external_id, since))
            .await
        {
            Ok(events) => days.extend(normalize(&events)),
            Err(err @ CoreError::NotFound(_)) => return Err(err),
            Err(err) => warn!(error = %err, "activity search failed, using fallback"),
        }

        if !days.contains(&today) {
            let events = self
                .bounded(&service, self.primary.fallback_activity(external_id, since))
                .await?;
            days.extend(normalize(&events));
        }

        days.retain(|d| *d >= since && *d <= today);
        Ok(PrimaryObservation {
            active_today: days.contains(&today),
            window_count: u32::try_from(days.len()).unwrap_or(u32::MAX),
        })
    }

    async fn reconcile_secondary(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(ProfileRecord, SubmissionCalendar)> {
        let _guard = self.locks.acquire(external_id).await;
        let prior = self
            .load(external_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(external_id.to_string()))?;
        let secondary_id = prior
            .linked_secondary_id
            .ok_or_else(|| CoreError::NotLinked(external_id.to_string()))?;

        let service = self.secondary.name().to_string();
        let calendar = self
            .bounded(&service, self.secondary.full_calendar(&secondary_id))
            .await?;

        let today = DayKey::from_timestamp(&now);
        let active_today = calendar.count_on(today) > 0;
        debug!(secondary = %secondary_id, active_today, "secondary observation");

        let record = self
            .store
            .upsert(
                external_id,
                now,
                Box::new(move |rec| rec.apply_secondary(today, active_today, now)),
            )
            .await
            .map_err(write_failed)?;
        Ok((record, calendar))
    }
}
