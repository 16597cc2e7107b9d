// Core reconciliation logic - everything between "a target exists" and "its gauges are current"
pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod reconciler;
pub mod scorecard;
pub mod secrets;
pub mod target;

pub use backoff::RetryConfig;
pub use config::{Config, FailurePolicy, SchedulerConfig};
pub use controller::Controller;
pub use error::Error;
pub use models::{Check, CheckStatus, MonitorConfig, Repository, ScorecardResult};
pub use providers::{Provider, ProviderConfig, ProviderKind, ProviderRegistry};
pub use reconciler::{PassOutcome, Reconciler};
pub use scorecard::{ScoreSource, ScorecardFetcher};
pub use secrets::{ConfigSecretStore, SecretStore};
pub use target::{TargetDescriptor, ENABLED_LABEL};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
