//! Streak engine: day keys, the reconciler and evolution stages.

mod day_key;
mod reconciler;
mod stage;

pub use day_key::{normalize, DayKey};
pub use reconciler::{reconcile, StreakState};
pub use stage::{map_stage, Stage};
