mod config;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod profile;

pub use config::{CacheConfig, Config, GitHubConfig, LeetCodeConfig, RetryConfig, StorageConfig, UpstreamConfig};
pub use database::SqliteProfileStore;
pub use memory::MemoryProfileStore;
pub use profile::{Mutator, PrimaryObservation, ProfileRecord, ProfileStore};

use std::path::PathBuf;

/// Returns `~/.config/codepet[-dev]/` based on CODEPET_ENV.
///
/// Set CODEPET_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CODEPET_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("codepet-dev")
    } else {
        base_dir.join("codepet")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
