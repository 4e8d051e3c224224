//! # Codepet Core Library
//!
//! Streak engine behind the codepet virtual pet. A pet grows while its owner
//! keeps a daily streak of commits (primary source, GitHub) or accepted
//! submissions (secondary source, LeetCode).
//!
//! ## Architecture
//!
//! - **Streak**: pure day-key normalization, the streak reconciler and the
//!   stage mapper
//! - **Sources**: async traits for activity providers plus their HTTP
//!   implementations
//! - **Storage**: profile store contract with SQLite and in-memory backends,
//!   and TOML-based configuration
//! - **Orchestrator**: one reconciliation pass per request, serialized per
//!   identity, with a TTL cache in front of repository listings
//!
//! ## Key Components
//!
//! - [`ReconciliationOrchestrator`]: public entry point
//! - [`ProfileStore`]: atomic whole-record persistence
//! - [`Config`]: application configuration management
//! - [`RetryPolicy`]: bounded client-side retry

pub mod cache;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod retry;
pub mod sources;
pub mod storage;
pub mod streak;

pub use cache::{CacheOperation, ResponseCache};
pub use error::{
    ConfigError, CoreError, DatabaseError, ErrorKind, Result, SourceError, ValidationError,
};
pub use locks::{IdentityGuard, IdentityLocks};
pub use orchestrator::{
    validate_identifier, LinkAck, ReconciliationOrchestrator, ReconciliationResult, RepoListing,
    SecondaryStatsResult, SourceSelector,
};
pub use retry::RetryPolicy;
pub use sources::{
    GitHubSource, LeetCodeSource, PrimarySource, RepoSummary, SecondarySource, SolvedCounts,
    SubmissionCalendar,
};
pub use storage::{Config, MemoryProfileStore, ProfileRecord, ProfileStore, SqliteProfileStore};
pub use streak::{map_stage, normalize, reconcile, DayKey, Stage, StreakState};
