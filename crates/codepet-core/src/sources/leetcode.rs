//! LeetCode as the secondary activity source.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::traits::{SecondarySource, SolvedCounts, SubmissionCalendar};
use crate::error::SourceError;
use crate::storage::Config;
use crate::streak::DayKey;

const PROFILE_QUERY: &str = "query getUserProfile($username: String!) {
  matchedUser(username: $username) {
    submitStats {
      acSubmissionNum {
        difficulty
        count
      }
    }
    submissionCalendar
  }
}";

pub struct LeetCodeSource {
    client: Client,
    endpoint: Url,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ProfileData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileData {
    matched_user: Option<MatchedUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    submit_stats: SubmitStats,
    #[serde(default)]
    submission_calendar: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    #[serde(default)]
    ac_submission_num: Vec<DifficultyCount>,
}

#[derive(Deserialize)]
struct DifficultyCount {
    difficulty: String,
    count: u32,
}

impl LeetCodeSource {
    /// # Errors
    /// Fails if `endpoint` is not a URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SourceError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Self::new(
            &config.leetcode.endpoint,
            &config.github.user_agent,
            config.upstream_timeout(),
        )
    }
}

/// Decode LeetCode's `submissionCalendar`: a JSON object, serialized as a
/// string, mapping Unix-second day starts to submission counts.
pub fn parse_calendar(raw: &str) -> Result<BTreeMap<DayKey, u32>, SourceError> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let entries: HashMap<String, u32> =
        serde_json::from_str(raw).map_err(|e| SourceError::Decode(format!("calendar: {e}")))?;

    let mut days = BTreeMap::new();
    for (ts, count) in entries {
        let day = ts
            .parse::<i64>()
            .ok()
            .and_then(DayKey::from_unix_seconds)
            .ok_or_else(|| SourceError::Decode(format!("calendar key {ts:?}")))?;
        *days.entry(day).or_insert(0) += count;
    }
    Ok(days)
}

fn solved_counts(stats: &[DifficultyCount]) -> SolvedCounts {
    let find = |name: &str| {
        stats
            .iter()
            .find(|s| s.difficulty == name)
            .map(|s| s.count)
            .unwrap_or(0)
    };
    SolvedCounts {
        all: find("All"),
        easy: find("Easy"),
        medium: find("Medium"),
        hard: find("Hard"),
    }
}

#[async_trait]
impl SecondarySource for LeetCodeSource {
    fn name(&self) -> &str {
        "leetcode"
    }

    async fn full_calendar(&self, secondary_id: &str) -> Result<SubmissionCalendar, SourceError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header("Referer", "https://leetcode.com")
            .json(&json!({
                "query": PROFILE_QUERY,
                "variables": { "username": secondary_id },
            }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = super::retry_after(resp.headers(), Utc::now());
            return Err(SourceError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        let user = body
            .data
            .and_then(|d| d.matched_user)
            .ok_or_else(|| SourceError::NotFound(secondary_id.to_string()))?;

        Ok(SubmissionCalendar {
            days: parse_calendar(user.submission_calendar.as_deref().unwrap_or(""))?,
            solved: solved_counts(&user.submit_stats.ac_submission_num),
        })
    }
}
