// Keeps one worker per enabled target and decides when each one runs again
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{backoff::RetryConfig, reconciler::Reconciler, target::TargetDescriptor};

struct Worker {
    descriptor: watch::Sender<TargetDescriptor>,
    handle: JoinHandle<()>,
}

/// Passes for one target never overlap; passes for different targets run
/// side by side.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    backoff: RetryConfig,
    shutdown: watch::Receiver<bool>,
    workers: HashMap<String, Worker>,
}

impl Controller {
    pub fn new(reconciler: Arc<Reconciler>, backoff: RetryConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            reconciler,
            backoff,
            shutdown,
            workers: HashMap::new(),
        }
    }

    /// Bring the set of workers in line with `descriptors`.
    ///
    /// New targets get a worker, changed ones are re-run right away, and
    /// targets that vanished (or lost the marker label) are stopped and
    /// their series retired.
    ///
    /// A removed worker has fully stopped before its series are retired, so
    /// an in-flight pass can't write them back afterwards.
    pub async fn sync(&mut self, descriptors: Vec<TargetDescriptor>) {
        let mut wanted: HashMap<String, TargetDescriptor> = HashMap::new();
        for descriptor in descriptors.into_iter().filter(TargetDescriptor::is_enabled) {
            if wanted.contains_key(&descriptor.name) {
                warn!(target_name = %descriptor.name, "Duplicate target name, keeping the last one");
            }
            wanted.insert(descriptor.name.clone(), descriptor);
        }

        let gone: Vec<String> = self
            .workers
            .keys()
            .filter(|name| !wanted.contains_key(*name))
            .cloned()
            .collect();
        for name in gone {
            if let Some(worker) = self.workers.remove(&name) {
                worker.handle.abort();
                if let Err(e) = worker.handle.await {
                    if !e.is_cancelled() {
                        warn!(target_name = %name, error = %e, "Worker ended abnormally");
                    }
                }
            }
            info!(target_name = %name, "Target removed");
            self.reconciler.retire(&name);
        }

        for (name, descriptor) in wanted {
            match self.workers.get(&name) {
                Some(worker) => {
                    let changed = worker.descriptor.send_if_modified(|current| {
                        if *current == descriptor {
                            false
                        } else {
                            *current = descriptor;
                            true
                        }
                    });
                    if changed {
                        info!(target_name = %name, "Target changed, triggering pass");
                    }
                }
                None => {
                    info!(target_name = %name, "Target added");
                    let worker = self.spawn(descriptor);
                    self.workers.insert(name, worker);
                }
            }
        }
    }

    /// Names of the targets that currently have a worker, sorted
    pub fn targets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Wait for every worker to stop. Workers stop when the shutdown signal fires.
    pub async fn join(mut self) {
        for (name, worker) in self.workers.drain() {
            if let Err(e) = worker.handle.await {
                if !e.is_cancelled() {
                    warn!(target_name = %name, error = %e, "Worker ended abnormally");
                }
            }
        }
    }

    fn spawn(&self, descriptor: TargetDescriptor) -> Worker {
        let (tx, rx) = watch::channel(descriptor);
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.reconciler),
            self.backoff.clone(),
            rx,
            self.shutdown.clone(),
        ));
        Worker {
            descriptor: tx,
            handle,
        }
    }
}

async fn run_worker(
    reconciler: Arc<Reconciler>,
    backoff: RetryConfig,
    mut descriptor: watch::Receiver<TargetDescriptor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let current = descriptor.borrow_and_update().clone();

        // Shutdown drops the in-flight pass along with its requests
        let outcome = tokio::select! {
            outcome = reconciler.reconcile(&current) => outcome,
            _ = shutdown.changed() => break,
        };

        let wait = match outcome {
            Ok(outcome) => {
                failures = 0;
                outcome.next_pass()
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = backoff.delay_for_attempt(failures);
                warn!(
                    target_name = %current.name,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Pass failed"
                );
                Some(delay)
            }
        };

        tokio::select! {
            _ = sleep_or_wait(wait) => {}
            changed = descriptor.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!(target_name = %current.name, "Descriptor changed, running early");
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("Worker stopped");
}

/// `None` waits forever; only a descriptor change or shutdown ends it
async fn sleep_or_wait(wait: Option<Duration>) {
    match wait {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
