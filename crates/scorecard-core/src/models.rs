use chrono::{DateTime, Utc};
use scorecard_metrics::{CheckSample, ScoreSample};
use serde::{Deserialize, Serialize};

use crate::providers::ProviderKind;

/// Published when a repository has no scorecard yet. A real value, not an error.
pub const NO_DATA_SCORE: f64 = -1.0;

/// Repository as seen by a provider during one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub default_branch: String,
    pub is_private: bool,
    pub is_archived: bool,
    pub is_fork: bool,
    pub is_disabled: bool,
}

impl Repository {
    /// Only public, active, non-fork repositories get scored
    pub fn is_eligible(&self) -> bool {
        !self.is_private && !self.is_archived && !self.is_disabled && !self.is_fork
    }
}

/// Pass/fail bucket for a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    Unknown,
}

impl CheckStatus {
    /// [0, 5) fails, 5 and up passes, anything else (the -1 "inconclusive"
    /// score included) is unknown
    pub fn from_score(score: i64) -> Self {
        match score {
            0..=4 => CheckStatus::Fail,
            s if s >= 5 => CheckStatus::Pass,
            _ => CheckStatus::Unknown,
        }
    }

    pub fn metric_value(&self) -> f64 {
        match self {
            CheckStatus::Pass => 1.0,
            CheckStatus::Fail => 0.0,
            CheckStatus::Unknown => -1.0,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "Pass"),
            CheckStatus::Fail => write!(f, "Fail"),
            CheckStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub score: i64,
    pub reason: String,
}

impl Check {
    /// Always derived from the score, never stored
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_score(self.score)
    }
}

/// Normalised scorecard for one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardResult {
    pub repository: String,
    pub commit: String,
    pub overall_score: f64,
    pub checks: Vec<Check>,
    pub timestamp: DateTime<Utc>,
}

impl ScorecardResult {
    /// The "no data yet" placeholder for a repository the API doesn't know
    pub fn unavailable(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            commit: String::new(),
            overall_score: NO_DATA_SCORE,
            checks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.overall_score >= 0.0
    }

    /// Reduce to the gauge values the metric store publishes
    pub fn to_sample(&self) -> ScoreSample {
        ScoreSample {
            overall_score: self.overall_score,
            checks: self
                .checks
                .iter()
                .map(|check| CheckSample {
                    name: check.name.clone(),
                    score: check.score as f64,
                    status: check.status().metric_value(),
                })
                .collect(),
            updated_at: self.timestamp,
        }
    }
}

/// Where to find the access token for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRef {
    pub secret_name: String,
    pub key: String,
}

/// One monitored target, parsed from its descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Identity of the target; every series it publishes is labelled with it
    pub name: String,
    pub organization: String,
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub credential: Option<CredentialRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        Repository {
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            url: "https://github.com/acme/widgets".into(),
            default_branch: "main".into(),
            is_private: false,
            is_archived: false,
            is_fork: false,
            is_disabled: false,
        }
    }

    #[test]
    fn test_check_status_from_score() {
        assert_eq!(CheckStatus::from_score(7), CheckStatus::Pass);
        assert_eq!(CheckStatus::from_score(5), CheckStatus::Pass);
        assert_eq!(CheckStatus::from_score(10), CheckStatus::Pass);
        assert_eq!(CheckStatus::from_score(3), CheckStatus::Fail);
        assert_eq!(CheckStatus::from_score(0), CheckStatus::Fail);
        assert_eq!(CheckStatus::from_score(4), CheckStatus::Fail);
        assert_eq!(CheckStatus::from_score(-1), CheckStatus::Unknown);
    }

    #[test]
    fn test_check_status_metric_values() {
        assert_eq!(CheckStatus::Pass.metric_value(), 1.0);
        assert_eq!(CheckStatus::Fail.metric_value(), 0.0);
        assert_eq!(CheckStatus::Unknown.metric_value(), -1.0);
    }

    #[test]
    fn test_repository_eligibility() {
        assert!(repo().is_eligible());
        assert!(!Repository { is_private: true, ..repo() }.is_eligible());
        assert!(!Repository { is_fork: true, ..repo() }.is_eligible());
        assert!(!Repository { is_archived: true, ..repo() }.is_eligible());
        assert!(!Repository { is_disabled: true, ..repo() }.is_eligible());
    }

    #[test]
    fn test_unavailable_result() {
        let result = ScorecardResult::unavailable("widgets");
        assert_eq!(result.overall_score, NO_DATA_SCORE);
        assert!(result.checks.is_empty());
        assert!(!result.has_data());
    }

    #[test]
    fn test_to_sample_derives_status() {
        let result = ScorecardResult {
            repository: "github.com/acme/widgets".into(),
            commit: "abc".into(),
            overall_score: 6.5,
            checks: vec![
                Check { name: "Maintained".into(), score: 10, reason: String::new() },
                Check { name: "Fuzzing".into(), score: 0, reason: String::new() },
                Check { name: "Packaging".into(), score: -1, reason: String::new() },
            ],
            timestamp: Utc::now(),
        };

        let sample = result.to_sample();
        let statuses: Vec<_> = sample.checks.iter().map(|c| (c.name.as_str(), c.status)).collect();
        assert_eq!(
            statuses,
            vec![("Maintained", 1.0), ("Fuzzing", 0.0), ("Packaging", -1.0)]
        );
        assert_eq!(sample.overall_score, 6.5);
    }
}
