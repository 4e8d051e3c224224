pub mod auth;
pub mod config;
pub mod leetcode;
pub mod pet;
pub mod repos;

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use codepet_core::{
    Config, CoreError, GitHubSource, LeetCodeSource, ReconciliationOrchestrator, RetryPolicy,
    SqliteProfileStore,
};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub retry: bool,
}

/// Everything a network command needs, built from the saved config.
pub struct Context {
    pub engine: ReconciliationOrchestrator,
    pub retry: RetryPolicy,
}

impl Context {
    pub fn load(opts: Options) -> Result<Self, CoreError> {
        let config = Config::load_or_default();
        let db_path = config.database_path()?;
        let store = SqliteProfileStore::open(&db_path)
            .map_err(|e| CoreError::Unavailable(e.to_string()))?;
        let github = GitHubSource::from_config(&config).map_err(|e| e.into_core("github"))?;
        let leetcode =
            LeetCodeSource::from_config(&config).map_err(|e| e.into_core("leetcode"))?;

        tracing::debug!(db = %db_path.display(), authenticated = github.is_authenticated(), "context ready");

        let engine = ReconciliationOrchestrator::from_config(
            &config,
            Arc::new(github),
            Arc::new(leetcode),
            Arc::new(store),
        );
        let retry = if opts.retry {
            config.retry_policy()
        } else {
            RetryPolicy::none()
        };
        Ok(Self { engine, retry })
    }

    /// Run `op` under the configured retry policy.
    pub async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.retry.run(op).await
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error to stderr, with status and hint for engine errors.
pub fn report(err: &(dyn Error + 'static)) {
    match err.downcast_ref::<CoreError>() {
        Some(core) => {
            let kind = core.kind();
            eprintln!("error [{}]: {}", kind.status_code(), kind.user_message());
            eprintln!("  {core}");
        }
        None => eprintln!("error: {err}"),
    }
}
