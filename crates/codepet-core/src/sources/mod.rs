//! Activity sources.
//!
//! The engine only sees the [`PrimarySource`] and [`SecondarySource`] traits.
//! `github` and `leetcode` hold the HTTP-backed implementations.

pub mod github;
pub mod leetcode;
mod traits;

pub use github::GitHubSource;
pub use leetcode::LeetCodeSource;
pub use traits::{
    PrimarySource, RepoSummary, SecondarySource, SolvedCounts, SubmissionCalendar,
};

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

/// Parse `retry-after` (seconds) or GitHub's `x-ratelimit-reset` (epoch seconds).
pub(crate) fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return u64::try_from(secs).ok().map(Duration::from_secs);
    }
    let reset = header("x-ratelimit-reset")?;
    u64::try_from(reset - now.timestamp())
        .ok()
        .map(Duration::from_secs)
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "codepet";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
