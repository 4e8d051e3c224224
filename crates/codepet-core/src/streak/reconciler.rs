//! Day-granular streak state machine.
//!
//! [`reconcile`] is the only place a streak counter moves. It is pure so the
//! orchestrator can re-run it inside a store mutator against whatever record
//! is actually persisted.

use serde::{Deserialize, Serialize};

use super::day_key::DayKey;

/// Streak counter plus the last day it was credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    pub streak: u32,
    pub last_active_day: Option<DayKey>,
}

impl StreakState {
    pub fn new(streak: u32, last_active_day: Option<DayKey>) -> Self {
        Self {
            streak,
            last_active_day,
        }
    }
}

/// Apply one day's observation to `prior`.
///
/// A day with no observed activity only resets the streak once the gap is
/// confirmed, i.e. the last credited day is older than yesterday. Crediting
/// the same day twice is a no-op.
pub fn reconcile(prior: StreakState, today: DayKey, active_today: bool) -> StreakState {
    let last = prior.last_active_day;
    let credited_today = last == Some(today);
    let credited_yesterday = last.is_some_and(|d| d.is_day_before(&today));

    if !active_today {
        if credited_today || credited_yesterday {
            return prior;
        }
        return StreakState {
            streak: 0,
            last_active_day: last,
        };
    }

    if credited_today {
        return prior;
    }

    let streak = if credited_yesterday {
        prior.streak.saturating_add(1)
    } else {
        1
    };

    StreakState {
        streak,
        last_active_day: Some(today),
    }
}
