//! Pet evolution stages derived from streak length.

use serde::{Deserialize, Serialize};

/// Discrete progression stage. Ordered from least to most evolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Egg,
    Baby,
    Grown,
    Evolved,
}

impl Stage {
    /// Map a streak length onto its stage.
    pub fn from_streak(max_streak: u32) -> Self {
        match max_streak {
            21.. => Stage::Evolved,
            14..=20 => Stage::Grown,
            7..=13 => Stage::Baby,
            _ => Stage::Egg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Egg => "egg",
            Stage::Baby => "baby",
            Stage::Grown => "grown",
            Stage::Evolved => "evolved",
        }
    }

    /// Encouragement shown next to the pet.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Egg => "Keep committing daily to hatch your egg!",
            Stage::Baby => "Your pet is growing! Maintain your streak.",
            Stage::Grown => "Great job! Your pet is thriving.",
            Stage::Evolved => "Amazing! Your pet has fully evolved.",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "egg" => Some(Stage::Egg),
            "baby" => Some(Stage::Baby),
            "grown" => Some(Stage::Grown),
            "evolved" => Some(Stage::Evolved),
            _ => None,
        }
    }
}

/// Stage for a pair of independent streaks: the better one wins.
pub fn map_stage(primary_streak: u32, secondary_streak: u32) -> Stage {
    Stage::from_streak(primary_streak.max(secondary_streak))
}
