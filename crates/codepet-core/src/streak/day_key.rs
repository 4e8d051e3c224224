//! Canonical UTC calendar days.
//!
//! Every "what day is this event on" decision goes through [`DayKey`].
//! Conversions always pass through UTC, so a commit stamped
//! `2024-03-10T23:30:00-05:00` lands on `2024-03-11`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A UTC calendar day. Totally ordered; serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Day containing `ts`, evaluated at UTC.
    pub fn from_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> Self {
        DayKey(ts.with_timezone(&Utc).date_naive())
    }

    /// Day containing the given Unix time. `None` if out of chrono's range.
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(|ts| Self::from_timestamp(&ts))
    }

    /// Day of an RFC 3339 timestamp such as GitHub's `pushed_at`.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| Self::from_timestamp(&ts))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DayKey)
    }

    /// UTC midnight that starts this day.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_time(chrono::NaiveTime::MIN))
    }

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_days(Days::new(1)).map(DayKey)
    }

    /// `n` days earlier, saturating at chrono's minimum date.
    pub fn minus_days(&self, n: u64) -> Self {
        DayKey(self.0.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN))
    }

    /// `n` days later, saturating at chrono's maximum date.
    pub fn plus_days(&self, n: u64) -> Self {
        DayKey(self.0.checked_add_days(Days::new(n)).unwrap_or(NaiveDate::MAX))
    }

    /// True when `self` is exactly the calendar day before `other`.
    pub fn is_day_before(&self, other: &DayKey) -> bool {
        self.next().is_some_and(|next| next == *other)
    }
}

/// Collapse timestamps into the set of distinct days they fall on.
pub fn normalize<'a, I>(timestamps: I) -> BTreeSet<DayKey>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    timestamps.into_iter().map(DayKey::from_timestamp).collect()
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(DayKey)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
