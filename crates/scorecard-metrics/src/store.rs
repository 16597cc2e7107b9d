use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::Result;

pub const DEFAULT_NAMESPACE: &str = "openssf_scorecard";

const REPO_LABELS: &[&str] = &["config", "organization", "repository"];
const CHECK_LABELS: &[&str] = &["config", "organization", "repository", "check"];

/// One repository's worth of score data, already reduced to gauge values
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSample {
    /// -1 means "no data yet"
    pub overall_score: f64,
    pub checks: Vec<CheckSample>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckSample {
    pub name: String,
    pub score: f64,
    /// 1 = pass, 0 = fail, -1 = unknown
    pub status: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RepoKey {
    organization: String,
    repository: String,
}

/// Every label combination written so far, per config. This is what lets
/// `retire` delete exactly what a config owns and nothing else.
type SeriesIndex = HashMap<String, HashMap<RepoKey, BTreeSet<String>>>;

/// In-memory gauge store with last-write-wins semantics.
///
/// All gauge mutations happen under one write lock together with the index
/// update, so concurrent upserts for different targets can't interleave a
/// half-written repository or leave the index out of sync with the gauges.
pub struct MetricStore {
    registry: Registry,
    overall_score: GaugeVec,
    check_score: GaugeVec,
    check_status: GaugeVec,
    last_update: GaugeVec,
    series: RwLock<SeriesIndex>,
}

impl MetricStore {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let overall_score = gauge(
            &registry,
            namespace,
            "overall_score",
            "Overall OpenSSF Scorecard score for a repository (0-10, -1 for unavailable)",
            REPO_LABELS,
        )?;
        let check_score = gauge(
            &registry,
            namespace,
            "check_score",
            "Score for individual OpenSSF Scorecard check (0-10, -1 for unavailable)",
            CHECK_LABELS,
        )?;
        let check_status = gauge(
            &registry,
            namespace,
            "check_status",
            "Status of individual OpenSSF Scorecard check (1=pass, 0=fail, -1=unavailable)",
            CHECK_LABELS,
        )?;
        let last_update = gauge(
            &registry,
            namespace,
            "last_update_timestamp",
            "Unix timestamp of the last scorecard data update",
            REPO_LABELS,
        )?;

        Ok(Self {
            registry,
            overall_score,
            check_score,
            check_status,
            last_update,
            series: RwLock::new(HashMap::new()),
        })
    }

    /// Set every series for one (config, organization, repository).
    ///
    /// Writing the same key again overwrites the previous value, and checks
    /// missing from `sample` are dropped.
    pub fn upsert(&self, config: &str, organization: &str, repository: &str, sample: &ScoreSample) {
        let mut series = self.series.write();

        let labels = [config, organization, repository];
        self.overall_score
            .with_label_values(&labels)
            .set(sample.overall_score);

        let checks = series
            .entry(config.to_string())
            .or_default()
            .entry(RepoKey {
                organization: organization.to_string(),
                repository: repository.to_string(),
            })
            .or_default();

        // Checks the new result no longer reports must not linger
        let stale: Vec<String> = checks
            .iter()
            .filter(|name| !sample.checks.iter().any(|c| &c.name == *name))
            .cloned()
            .collect();
        for name in stale {
            let check_labels = [config, organization, repository, name.as_str()];
            let _ = self.check_score.remove_label_values(&check_labels);
            let _ = self.check_status.remove_label_values(&check_labels);
            checks.remove(&name);
        }

        for check in &sample.checks {
            let check_labels = [config, organization, repository, check.name.as_str()];
            self.check_score
                .with_label_values(&check_labels)
                .set(check.score);
            self.check_status
                .with_label_values(&check_labels)
                .set(check.status);
            checks.insert(check.name.clone());
        }

        self.last_update
            .with_label_values(&labels)
            .set(sample.updated_at.timestamp() as f64);
    }

    /// Delete every series that belongs to `config`. Returns how many
    /// individual series were removed.
    pub fn retire(&self, config: &str) -> usize {
        let mut series = self.series.write();

        let Some(repos) = series.remove(config) else {
            return 0;
        };

        let removed: usize = repos
            .iter()
            .map(|(key, checks)| self.remove_repository(config, key, checks))
            .sum();

        debug!("Retired {} series for config {}", removed, config);
        removed
    }

    /// Drop the repositories of `config` that are not `organization`/one of
    /// `keep`. Covers repositories that left the listing and a target that
    /// moved to another organization. Returns how many series were removed.
    pub fn retain_repositories(&self, config: &str, organization: &str, keep: &[&str]) -> usize {
        let mut series = self.series.write();

        let Some(repos) = series.get_mut(config) else {
            return 0;
        };

        let stale: Vec<RepoKey> = repos
            .keys()
            .filter(|key| {
                key.organization != organization || !keep.contains(&key.repository.as_str())
            })
            .cloned()
            .collect();

        let mut removed = 0;
        for key in stale {
            if let Some(checks) = repos.remove(&key) {
                removed += self.remove_repository(config, &key, &checks);
            }
        }

        if removed > 0 {
            debug!("Pruned {} stale series for config {}", removed, config);
        }
        removed
    }

    pub fn overall_score(&self, config: &str, organization: &str, repository: &str) -> Option<f64> {
        let series = self.series.read();
        self.repo_known(&series, config, organization, repository)
            .then(|| self.overall_score.with_label_values(&[config, organization, repository]).get())
    }

    pub fn last_update(&self, config: &str, organization: &str, repository: &str) -> Option<f64> {
        let series = self.series.read();
        self.repo_known(&series, config, organization, repository)
            .then(|| self.last_update.with_label_values(&[config, organization, repository]).get())
    }

    /// (score, status) for one check
    pub fn check(
        &self,
        config: &str,
        organization: &str,
        repository: &str,
        check: &str,
    ) -> Option<(f64, f64)> {
        let series = self.series.read();
        let known = series
            .get(config)
            .and_then(|repos| {
                repos.get(&RepoKey {
                    organization: organization.to_string(),
                    repository: repository.to_string(),
                })
            })
            .is_some_and(|checks| checks.contains(check));

        known.then(|| {
            let labels = [config, organization, repository, check];
            (
                self.check_score.with_label_values(&labels).get(),
                self.check_status.with_label_values(&labels).get(),
            )
        })
    }

    /// Names of the repositories currently published for a config, sorted
    pub fn repositories(&self, config: &str) -> Vec<(String, String)> {
        let series = self.series.read();
        let mut repos: Vec<_> = series
            .get(config)
            .map(|repos| {
                repos
                    .keys()
                    .map(|k| (k.organization.clone(), k.repository.clone()))
                    .collect()
            })
            .unwrap_or_default();
        repos.sort();
        repos
    }

    /// Render everything in Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let _series = self.series.read();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn remove_repository(&self, config: &str, key: &RepoKey, checks: &BTreeSet<String>) -> usize {
        let labels = [config, key.organization.as_str(), key.repository.as_str()];
        let mut removed = count_removed(self.overall_score.remove_label_values(&labels));
        removed += count_removed(self.last_update.remove_label_values(&labels));

        for check in checks {
            let check_labels = [
                config,
                key.organization.as_str(),
                key.repository.as_str(),
                check.as_str(),
            ];
            removed += count_removed(self.check_score.remove_label_values(&check_labels));
            removed += count_removed(self.check_status.remove_label_values(&check_labels));
        }
        removed
    }

    fn repo_known(
        &self,
        series: &SeriesIndex,
        config: &str,
        organization: &str,
        repository: &str,
    ) -> bool {
        series.get(config).is_some_and(|repos| {
            repos.contains_key(&RepoKey {
                organization: organization.to_string(),
                repository: repository.to_string(),
            })
        })
    }
}

fn gauge(
    registry: &Registry,
    namespace: &str,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help).namespace(namespace), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn count_removed(result: prometheus::Result<()>) -> usize {
    usize::from(result.is_ok())
}
