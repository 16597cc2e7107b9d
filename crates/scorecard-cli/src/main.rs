use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scorecard_core::{
    Config, ConfigSecretStore, Controller, PassOutcome, ProviderKind, ProviderRegistry, Reconciler,
    ScorecardFetcher, TargetDescriptor, ENABLED_LABEL,
};
use scorecard_metrics::{MetricStore, MetricsServer};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scorecard-exporter")]
#[command(version, about = "Publishes OpenSSF Scorecard results as Prometheus gauges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Watch the configured targets and serve metrics until interrupted
    Run {
        /// Config file (defaults to the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a single pass for one organization and print the resulting metrics
    Check {
        /// Organization or group to scan
        #[arg(short, long)]
        organization: String,

        /// Hosting backend: github or gitlab
        #[arg(short, long, default_value = "github")]
        provider: String,

        /// API root for self-hosted backends
        #[arg(long)]
        base_url: Option<String>,

        /// Environment variable holding the access token
        #[arg(long)]
        token_env: Option<String>,

        /// Config file for the scorecard endpoint and scheduler settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorecard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config.as_deref()).await,
        Commands::Check {
            organization,
            provider,
            base_url,
            token_env,
            config,
        } => {
            check(
                &organization,
                &provider,
                base_url,
                token_env.as_deref(),
                config.as_deref(),
            )
            .await
        }
    }
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("Failed to load config")?;

    let store = Arc::new(MetricStore::new(&config.metrics.namespace)?);
    let fetcher = ScorecardFetcher::with_endpoint(
        config.scorecard.api_url.clone(),
        config.scorecard.timeout(),
    )?;
    let secrets = Arc::new(ConfigSecretStore::new(config.secrets.clone()));
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(fetcher),
        Arc::clone(&store),
        Arc::clone(&secrets) as Arc<dyn scorecard_core::SecretStore>,
        config.scheduler.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = MetricsServer::new(config.metrics.server_config(), Arc::clone(&store));
    let listener = server.bind().await.context("Failed to bind metrics listener")?;
    let server_task = tokio::spawn(server.serve(listener, shutdown_rx.clone()));

    let mut controller = Controller::new(reconciler, config.backoff.clone(), shutdown_rx);
    controller.sync(config.targets.clone()).await;
    info!(targets = ?controller.targets(), "Exporter started");

    let mut reload = tokio::time::interval(config.scheduler.watch_interval());
    reload.tick().await; // the first tick fires immediately

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = reload.tick() => {
                match Config::load(config_path) {
                    Ok(fresh) => {
                        secrets.replace(fresh.secrets);
                        controller.sync(fresh.targets).await;
                    }
                    Err(e) => warn!(error = %e, "Failed to reload config, keeping current targets"),
                }
            }
        }
    }

    // Receivers only go away once everything has stopped, so this can't fail in practice
    let _ = shutdown_tx.send(true);
    controller.join().await;
    server_task.await.context("Metrics server task panicked")??;

    Ok(())
}

async fn check(
    organization: &str,
    provider: &str,
    base_url: Option<String>,
    token_env: Option<&str>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("Failed to load config")?;
    let kind: ProviderKind = provider.parse()?;

    let mut data = HashMap::from([
        ("organization".to_string(), organization.to_string()),
        ("providerType".to_string(), kind.to_string()),
    ]);
    if let Some(url) = base_url {
        data.insert("baseURL".to_string(), url);
    }

    let mut secrets = HashMap::new();
    if let Some(var) = token_env {
        let token = std::env::var(var).with_context(|| format!("{} is not set", var))?;
        secrets.insert(
            "cli".to_string(),
            HashMap::from([("token".to_string(), token)]),
        );
        data.insert("tokenSecret".to_string(), "cli".to_string());
    }

    let descriptor = TargetDescriptor {
        name: format!("cli/{}", organization),
        labels: HashMap::from([(ENABLED_LABEL.to_string(), "true".to_string())]),
        data,
    };

    let store = Arc::new(MetricStore::new(&config.metrics.namespace)?);
    let reconciler = Reconciler::new(
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(ScorecardFetcher::with_endpoint(
            config.scorecard.api_url.clone(),
            config.scorecard.timeout(),
        )?),
        Arc::clone(&store),
        Arc::new(ConfigSecretStore::new(secrets)),
        config.scheduler.clone(),
    );

    match reconciler.reconcile(&descriptor).await? {
        PassOutcome::Completed { repositories, .. } => {
            println!("# {} repositories scored", repositories);
            print!("{}", store.render()?);
        }
        PassOutcome::RateLimited { retry_after } => {
            println!("Rate limited, try again in {}s", retry_after.as_secs());
        }
        PassOutcome::Skipped { reason } => {
            anyhow::bail!("Target skipped: {}", reason);
        }
    }

    Ok(())
}
