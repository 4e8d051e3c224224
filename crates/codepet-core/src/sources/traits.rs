use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::streak::DayKey;

/// Commit-based activity provider (GitHub).
///
/// Implementations are stateless between calls and must not retry
/// internally; the orchestrator owns timeouts and fallback order.
#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Unique identifier used in logs and errors (e.g. "github").
    fn name(&self) -> &str;

    /// Fails with [`SourceError::NotFound`] for unknown identities.
    async fn verify_identity(&self, id: &str) -> Result<(), SourceError>;

    /// Event timestamps authored by `id` on or after `since`.
    async fn search_activity(
        &self,
        id: &str,
        since: DayKey,
    ) -> Result<Vec<DateTime<Utc>>, SourceError>;

    /// Coarser signal used when the search fails or has nothing for today.
    async fn fallback_activity(
        &self,
        id: &str,
        since: DayKey,
    ) -> Result<Vec<DateTime<Utc>>, SourceError>;

    /// Repositories owned by `id`, most recently pushed first.
    async fn list_repositories(&self, id: &str) -> Result<Vec<RepoSummary>, SourceError>;
}

/// Submission-based activity provider (LeetCode).
#[async_trait]
pub trait SecondarySource: Send + Sync {
    fn name(&self) -> &str;

    async fn full_calendar(&self, secondary_id: &str) -> Result<SubmissionCalendar, SourceError>;
}

/// A repository as listed for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accepted-problem totals by difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedCounts {
    pub all: u32,
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

/// Per-day submission counts plus aggregate totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCalendar {
    pub days: BTreeMap<DayKey, u32>,
    pub solved: SolvedCounts,
}

impl SubmissionCalendar {
    pub fn count_on(&self, day: DayKey) -> u32 {
        self.days.get(&day).copied().unwrap_or(0)
    }

    /// Most recent day with at least one submission.
    pub fn last_active_day(&self) -> Option<DayKey> {
        self.active_days().next_back()
    }

    /// Longest run of consecutive active days anywhere in the calendar.
    pub fn longest_run(&self) -> u32 {
        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<DayKey> = None;
        for day in self.active_days() {
            run = match prev {
                Some(p) if p.is_day_before(&day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(day);
        }
        longest
    }

    fn active_days(&self) -> impl DoubleEndedIterator<Item = DayKey> + '_ {
        self.days
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(day, _)| *day)
    }
}
