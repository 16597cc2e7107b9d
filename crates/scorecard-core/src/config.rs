use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{backoff::RetryConfig, secrets::Secret, target::TargetDescriptor};

/// Main configuration structure
///
/// Everything has a default, so an empty file (or no file at all) gives a
/// runnable exporter with nothing to watch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub backoff: RetryConfig,
    #[serde(default)]
    pub scorecard: ScorecardConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Stand-in for the external credential store
    #[serde(default)]
    pub secrets: HashMap<String, Secret>,

    /// Stand-in for the external watch mechanism
    #[serde(default)]
    pub targets: Vec<TargetDescriptor>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file just means defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            crate::Error::ConfigError(format!(
                "Failed to read {}: {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Get the config file path
    /// Uses XDG on Linux/macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("scorecard-exporter");

        Ok(config_dir.join("config.toml"))
    }
}

/// What to do when one repository's score can't be fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Give up on the rest of the pass
    #[default]
    Abort,
    /// Log it and move on to the next repository
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Base interval between passes of one target
    #[serde(default = "default_requeue_interval")]
    pub requeue_interval_secs: u64,

    /// +/- randomisation of that interval, in percent
    #[serde(default = "default_max_jitter")]
    pub max_jitter_percent: u32,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// How often the target list is re-read
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

fn default_requeue_interval() -> u64 {
    3600 // hourly; scorecards don't move faster than that
}

fn default_max_jitter() -> u32 {
    10
}

fn default_watch_interval() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            requeue_interval_secs: default_requeue_interval(),
            max_jitter_percent: default_max_jitter(),
            failure_policy: FailurePolicy::default(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardConfig {
    #[serde(default = "default_scorecard_url")]
    pub api_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_scorecard_url() -> String {
    scorecard_api::SCORECARD_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            api_url: default_scorecard_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ScorecardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_namespace() -> String {
    scorecard_metrics::DEFAULT_NAMESPACE.to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            metrics_path: default_metrics_path(),
            namespace: default_namespace(),
        }
    }
}

impl MetricsConfig {
    pub fn server_config(&self) -> scorecard_metrics::ServerConfig {
        scorecard_metrics::ServerConfig {
            listen_addr: self.listen_addr.clone(),
            metrics_path: self.metrics_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ENABLED_LABEL;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.requeue_interval_secs, 3600);
        assert_eq!(config.scheduler.max_jitter_percent, 10);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.scorecard.api_url, "https://api.securityscorecards.dev");
        assert_eq!(config.scorecard.timeout(), Duration::from_secs(30));
        assert_eq!(config.metrics.namespace, "openssf_scorecard");
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.metrics.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.backoff, RetryConfig::default());
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            [scheduler]
            requeue_interval_secs = 600
            failure_policy = "continue"

            [backoff]
            initial_delay_ms = 100

            [metrics]
            listen_addr = "127.0.0.1:9100"

            [secrets.github-token]
            token = "ghp_abc"

            [[targets]]
            name = "default/acme"
            labels = { "scorecard-exporter/enabled" = "true" }
            data = { organization = "acme", tokenSecret = "github-token" }
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.requeue_interval(), Duration::from_secs(600));
        assert_eq!(config.scheduler.max_jitter_percent, 10);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.backoff.initial_delay_ms, 100);
        assert_eq!(config.backoff.max_delay_ms, 300_000);
        assert_eq!(config.metrics.listen_addr, "127.0.0.1:9100");
        assert_eq!(config.metrics.metrics_path, "/metrics");
        assert_eq!(config.secrets["github-token"]["token"], "ghp_abc");

        assert_eq!(config.targets.len(), 1);
        let target = &config.targets[0];
        assert!(target.labels.contains_key(ENABLED_LABEL));
        assert_eq!(target.data["organization"], "acme");
    }

    #[test]
    fn test_bad_policy_is_config_error() {
        let err = Config::from_toml_str("[scheduler]\nfailure_policy = \"retry\"").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.is_config_error());
    }
}
