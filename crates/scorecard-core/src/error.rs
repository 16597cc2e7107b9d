use scorecard_api::{GitHubError, GitLabError, RateLimitError, ScorecardError};
use scorecard_metrics::MetricsError;
use thiserror::Error;

use crate::rate_limit;

/// All the ways a reconciliation pass can go wrong
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Carries the typed signal so the scheduler knows how long to wait
    #[error("{0}")]
    RateLimited(#[source] RateLimitError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("unsupported provider type: {0}")]
    UnsupportedProvider(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Problems a retry won't fix; the pass is skipped until the target changes
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::ConfigError(_) | Error::UnsupportedProvider(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        rate_limit::is_rate_limit(Some(self as &(dyn std::error::Error + 'static)))
    }

    pub fn retry_delay(&self) -> std::time::Duration {
        rate_limit::retry_delay(Some(self as &(dyn std::error::Error + 'static)))
    }
}

impl From<RateLimitError> for Error {
    fn from(err: RateLimitError) -> Self {
        Error::RateLimited(err)
    }
}

impl From<GitHubError> for Error {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::RateLimited(r) => Error::RateLimited(r),
            GitHubError::NotFound(what) => Error::NotFound(what),
            GitHubError::NetworkError(e) => Error::NetworkError(e),
            GitHubError::ParseError(e) => Error::SerializationError(e),
            other @ GitHubError::RequestFailed { .. } => Error::ApiError(other.to_string()),
        }
    }
}

impl From<GitLabError> for Error {
    fn from(err: GitLabError) -> Self {
        match err {
            GitLabError::RateLimited(r) => Error::RateLimited(r),
            GitLabError::NotFound(what) => Error::NotFound(what),
            GitLabError::NetworkError(e) => Error::NetworkError(e),
            GitLabError::ParseError(e) => Error::SerializationError(e),
            other @ GitLabError::RequestFailed { .. } => Error::ApiError(other.to_string()),
        }
    }
}

impl From<ScorecardError> for Error {
    fn from(err: ScorecardError) -> Self {
        match err {
            ScorecardError::NotFound(path) => Error::NotFound(path),
            ScorecardError::NetworkError(e) => Error::NetworkError(e),
            ScorecardError::ParseError(e) => Error::SerializationError(e),
            other @ ScorecardError::RequestFailed { .. } => Error::ApiError(other.to_string()),
        }
    }
}
