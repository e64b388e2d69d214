use super::{CacheStore, SweepReport};
use crate::clock::Clock;
use crate::error::{KnowledgeError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background task: evicts cache entries older than the store's TTL.
///
/// Only age is checked here. Fingerprint staleness is caught on the next
/// composition request for the tenant.
pub struct Janitor {
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Janitor {
    pub fn new(store: Arc<CacheStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// One sweep. A panic inside the sweep is logged and reported as `None`
    /// so the loop survives to the next tick.
    pub fn run_once(&self) -> Option<SweepReport> {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.store.sweep_at(self.clock.as_ref())));

        match outcome {
            Ok(report) => {
                if report.evicted > 0 {
                    log::info!(
                        "Cache janitor: evicted {} of {} entries ({} skipped)",
                        report.evicted,
                        report.examined,
                        report.skipped
                    );
                } else {
                    log::debug!("Cache janitor: {} entries, none expired", report.examined);
                }
                Some(report)
            }
            Err(_) => {
                log::error!("Cache janitor: sweep panicked, retrying next tick");
                None
            }
        }
    }

    /// Start the sweep loop on the current tokio runtime.
    pub fn spawn(self) -> Result<JanitorHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| KnowledgeError::NoRuntime)?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = runtime.spawn(async move {
            log::info!(
                "Cache janitor started (interval: {}s, ttl: {}s)",
                self.interval.as_secs(),
                self.store.ttl().as_secs()
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Cache janitor stopped");
        });

        Ok(JanitorHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

/// Owns the running janitor task. Dropping the handle aborts the task.
pub struct JanitorHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl JanitorHandle {
    /// Signal the loop to exit after its current sweep.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    log::error!("Cache janitor task panicked: {}", e);
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
