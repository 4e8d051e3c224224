//! Core error types for codepet-core.
//!
//! `CoreError` is the taxonomy callers see. Lower layers have their own
//! enums (`SourceError`, `DatabaseError`, `ConfigError`) that the
//! orchestrator folds into it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core error type for codepet-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The identity does not exist on the upstream provider.
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// The upstream provider is throttling us. Never treated as "no activity".
    #[error("Rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    /// The profile store could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Input failed a precondition check.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Any other upstream failure, timeouts included.
    #[error("Upstream error from {service}: {message}")]
    Upstream { service: String, message: String },

    /// Secondary stats were requested before a secondary account was linked.
    #[error("No secondary account linked for {0}")]
    NotLinked(String),

    /// Database-related errors raised after the store was reached
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of a [`CoreError`] for the caller-facing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    Unavailable,
    Validation,
    Upstream,
    NotLinked,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code, one per kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Unavailable => 503,
            ErrorKind::Validation => 400,
            ErrorKind::Upstream => 502,
            ErrorKind::NotLinked => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Message a human can act on.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Identity not found.",
            ErrorKind::RateLimited => "Rate limited by the activity provider. Try again later.",
            ErrorKind::Unavailable => "Storage is unavailable. Try again later.",
            ErrorKind::Validation => "Invalid input.",
            ErrorKind::Upstream => "Failed to fetch activity. Please retry.",
            ErrorKind::NotLinked => "No secondary account is linked yet.",
            ErrorKind::Internal => "Something went wrong.",
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::RateLimited { .. } => ErrorKind::RateLimited,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Upstream { .. } => ErrorKind::Upstream,
            CoreError::NotLinked(_) => ErrorKind::NotLinked,
            CoreError::Database(_)
            | CoreError::Config(_)
            | CoreError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether a client-side retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::Upstream)
    }

    pub(crate) fn upstream(service: &str, message: impl Into<String>) -> Self {
        CoreError::Upstream {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised by an activity source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl SourceError {
    /// Fold into the caller-facing taxonomy, tagging the originating service.
    pub fn into_core(self, service: &str) -> CoreError {
        match self {
            SourceError::NotFound(id) => CoreError::NotFound(id),
            SourceError::RateLimited { retry_after } => CoreError::RateLimited {
                service: service.to_string(),
                retry_after,
            },
            other => CoreError::upstream(service, other.to_string()),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Store is offline or its connection is poisoned
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required field was empty
    #[error("'{0}' is required")]
    Missing(String),

    /// Identifier failed the allowed-character pattern
    #[error("Invalid format for '{field}': {value:?} (letters, digits, '-' and '_' only)")]
    InvalidIdentifier { field: String, value: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else if err.code == rusqlite::ErrorCode::CannotOpen {
                    DatabaseError::Unavailable(err.to_string())
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
