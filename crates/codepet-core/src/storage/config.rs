//! TOML-based application configuration.
//!
//! Stores:
//! - Upstream endpoints and credentials for GitHub and LeetCode
//! - Timeouts and the activity window
//! - Listing cache TTL
//! - Client retry policy
//! - Database location
//!
//! Configuration is stored at `~/.config/codepet/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// GitHub (primary source) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token. `GITHUB_TOKEN` and the OS keyring are consulted when unset.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// LeetCode (secondary source) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeetCodeConfig {
    #[serde(default = "default_leetcode_endpoint")]
    pub endpoint: String,
}

/// Limits applied to every upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Trailing window of primary activity considered per pass.
    #[serde(default = "default_window_days")]
    pub activity_window_days: u32,
}

/// Repository listing cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Client-side retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Profile storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to `codepet.db` in the data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/codepet/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub leetcode: LeetCodeConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}
fn default_user_agent() -> String {
    "codepet".into()
}
fn default_leetcode_endpoint() -> String {
    "https://leetcode.com/graphql".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_window_days() -> u32 {
    30
}
fn default_cache_ttl_secs() -> u64 {
    60 * 60
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LeetCodeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_leetcode_endpoint(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            activity_window_days: default_window_days(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("~/.config/codepet"),
                message: e.to_string(),
            })
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// GitHub token: `GITHUB_TOKEN`, then the config file, then the OS keyring.
    pub fn github_token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.github.token.clone().filter(|t| !t.is_empty()))
            .or_else(|| crate::sources::keyring_store::get("github_token").ok().flatten())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    /// Database file, defaulting into the data directory.
    pub fn database_path(&self) -> std::io::Result<PathBuf> {
        match &self.storage.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join("codepet.db")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cache.ttl_secs, 3600);
        assert_eq!(parsed.upstream.activity_window_days, 30);
        assert_eq!(parsed.github.api_base, "https://api.github.com");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[upstream]\ntimeout_secs = 3\n").unwrap();
        assert_eq!(parsed.upstream.timeout_secs, 3);
        assert_eq!(parsed.upstream.activity_window_days, 30);
        assert_eq!(parsed.retry.max_retries, 3);
        assert_eq!(parsed.leetcode.endpoint, "https://leetcode.com/graphql");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("cache.ttl_secs").as_deref(), Some("3600"));
        assert_eq!(cfg.get("github.user_agent").as_deref(), Some("codepet"));
        assert!(cfg.get("cache.missing").is_none());
    }

    #[test]
    fn set_updates_numbers_and_optional_strings() {
        let mut cfg = Config::default();
        cfg.set("retry.max_retries", "5").unwrap();
        cfg.set("github.token", "ghp_example").unwrap();
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.github.token.as_deref(), Some("ghp_example"));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_numbers() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("cache.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("cache.ttl_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.cache.ttl_secs, 3600);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.upstream.timeout_secs, 10);

        let mut changed = cfg.clone();
        changed.set("upstream.timeout_secs", "4").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().upstream.timeout_secs, 4);
    }

    #[test]
    fn retry_policy_reflects_config() {
        let cfg = Config::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    }
}
