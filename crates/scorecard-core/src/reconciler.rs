// One reconciliation pass: descriptor in, gauges updated, next delay out
use std::sync::Arc;
use std::time::Duration;

use scorecard_metrics::MetricStore;
use tracing::{debug, error, info, warn};

use crate::{
    backoff::jittered,
    config::{FailurePolicy, SchedulerConfig},
    models::{MonitorConfig, ScorecardResult},
    providers::{ProviderConfig, ProviderRegistry},
    scorecard::ScoreSource,
    secrets::SecretStore,
    target::TargetDescriptor,
    Error, Result,
};

/// How a pass ended, when it didn't end in an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every repository was visited
    Completed {
        repositories: usize,
        next_pass: Duration,
    },
    /// The backend told us to back off; not a failure
    RateLimited { retry_after: Duration },
    /// Bad configuration. Nothing to do until the target changes.
    Skipped { reason: String },
}

impl PassOutcome {
    /// `None` means "wait for the next external trigger"
    pub fn next_pass(&self) -> Option<Duration> {
        match self {
            PassOutcome::Completed { next_pass, .. } => Some(*next_pass),
            PassOutcome::RateLimited { retry_after } => Some(*retry_after),
            PassOutcome::Skipped { .. } => None,
        }
    }
}

pub struct Reconciler {
    registry: Arc<ProviderRegistry>,
    scores: Arc<dyn ScoreSource>,
    store: Arc<MetricStore>,
    secrets: Arc<dyn SecretStore>,
    scheduler: SchedulerConfig,
}

impl Reconciler {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        scores: Arc<dyn ScoreSource>,
        store: Arc<MetricStore>,
        secrets: Arc<dyn SecretStore>,
        scheduler: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            scores,
            store,
            secrets,
            scheduler,
        }
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    /// Run one pass for a target.
    ///
    /// `Err` means the pass failed and should be retried with backoff. Rate
    /// limits and configuration problems are outcomes, not errors.
    pub async fn reconcile(&self, descriptor: &TargetDescriptor) -> Result<PassOutcome> {
        let config = match MonitorConfig::from_descriptor(descriptor) {
            Ok(config) => config,
            Err(e) => return skip_or_fail(&descriptor.name, e),
        };
        self.reconcile_config(&config).await
    }

    pub async fn reconcile_config(&self, config: &MonitorConfig) -> Result<PassOutcome> {
        let token = match self.resolve_token(config).await {
            Ok(token) => token,
            Err(e) => return skip_or_fail(&config.name, e),
        };

        let provider = match self.registry.resolve(&ProviderConfig {
            kind: config.provider,
            token: token.clone(),
            base_url: config.base_url.clone(),
            organization: config.organization.clone(),
        }) {
            Ok(provider) => provider,
            Err(e) => return skip_or_fail(&config.name, e),
        };

        info!(
            target_name = %config.name,
            organization = %config.organization,
            provider = %provider.kind(),
            "Fetching repositories"
        );

        let repos = match provider.list_repositories(&config.organization).await {
            Ok(repos) => repos,
            Err(e) if e.is_rate_limit() => {
                let retry_after = e.retry_delay();
                info!(
                    target_name = %config.name,
                    organization = %config.organization,
                    provider = %provider.kind(),
                    retry_after_secs = retry_after.as_secs(),
                    error = %e,
                    "Rate limited while listing repositories, will retry later"
                );
                return Ok(PassOutcome::RateLimited { retry_after });
            }
            Err(e) => {
                error!(
                    target_name = %config.name,
                    organization = %config.organization,
                    error = %e,
                    "Failed to list repositories"
                );
                return Err(e);
            }
        };

        info!(
            target_name = %config.name,
            organization = %config.organization,
            count = repos.len(),
            "Found repositories"
        );

        let mut published = 0;
        for repo in &repos {
            let lookup_key = provider.score_lookup_key(&config.organization, &repo.name);
            debug!(repository = %repo.name, lookup_key = %lookup_key, "Fetching scorecard");

            let result = match self.scores.fetch_score(&lookup_key, token.as_deref()).await {
                Ok(result) => result,
                Err(e) if e.is_not_found() => {
                    info!(
                        target_name = %config.name,
                        organization = %config.organization,
                        repository = %repo.name,
                        "Scorecard data not yet available"
                    );
                    ScorecardResult::unavailable(repo.name.as_str())
                }
                Err(e) => match self.scheduler.failure_policy {
                    FailurePolicy::Abort => {
                        error!(
                            target_name = %config.name,
                            organization = %config.organization,
                            repository = %repo.name,
                            error = %e,
                            "Failed to fetch scorecard, aborting pass"
                        );
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            target_name = %config.name,
                            organization = %config.organization,
                            repository = %repo.name,
                            error = %e,
                            "Failed to fetch scorecard, skipping repository"
                        );
                        continue;
                    }
                },
            };

            self.store.upsert(
                &config.name,
                &config.organization,
                &repo.name,
                &result.to_sample(),
            );
            published += 1;
        }

        // Anything this target published earlier that the listing no longer
        // returns goes away. Repositories skipped above keep their last values.
        let listed: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
        let pruned = self
            .store
            .retain_repositories(&config.name, &config.organization, &listed);
        if pruned > 0 {
            debug!(target_name = %config.name, pruned, "Removed stale series");
        }

        let next_pass = jittered(
            self.scheduler.requeue_interval(),
            self.scheduler.max_jitter_percent,
        );
        info!(
            target_name = %config.name,
            organization = %config.organization,
            repositories = published,
            next_pass_secs = next_pass.as_secs(),
            "Reconciled target"
        );

        Ok(PassOutcome::Completed {
            repositories: published,
            next_pass,
        })
    }

    /// Drop every series a target published
    pub fn retire(&self, name: &str) -> usize {
        let removed = self.store.retire(name);
        info!(target_name = name, removed, "Retired target series");
        removed
    }

    async fn resolve_token(&self, config: &MonitorConfig) -> Result<Option<String>> {
        let Some(credential) = &config.credential else {
            return Ok(None);
        };

        let secret = self
            .secrets
            .get(&credential.secret_name)
            .await?
            .ok_or_else(|| Error::SecretNotFound(credential.secret_name.clone()))?;

        match secret.get(&credential.key) {
            Some(token) => Ok(Some(token.clone())),
            None => Err(Error::ConfigError(format!(
                "key {} not found in secret {}",
                credential.key, credential.secret_name
            ))),
        }
    }
}

/// Configuration problems end the pass quietly; anything else is a failure
fn skip_or_fail(name: &str, err: Error) -> Result<PassOutcome> {
    if err.is_config_error() {
        warn!(target_name = name, error = %err, "Skipping target");
        Ok(PassOutcome::Skipped {
            reason: err.to_string(),
        })
    } else {
        error!(target_name = name, error = %err, "Pass failed before listing");
        Err(err)
    }
}
