//! Interval scheduling of configured sync runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SyncConfiguration;
use crate::engine::{RunOptions, SyncEngine};
use crate::result::SyncRunResult;

/// Default interval between due-configuration polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Polls the registry and launches runs whose schedule interval has elapsed.
///
/// A configuration is due when it is enabled, carries an enabled schedule,
/// and at least `interval_minutes` have passed since its last run (or it has
/// never run). Runs launch sequentially within a poll tick. A configuration
/// that still has a run in flight is skipped for the tick rather than piled
/// onto; it becomes due again once that run stamps `last_run_at`.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
}

impl SyncScheduler {
    /// Create a scheduler over the given engine with the default poll interval.
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the poll interval (builder style).
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Configurations whose scheduled run is due now.
    pub async fn due_configurations(&self) -> Vec<SyncConfiguration> {
        let now = Utc::now();
        self.engine
            .registry()
            .list()
            .await
            .into_iter()
            .filter(|c| c.is_due(now))
            .collect()
    }

    /// Run every due configuration once, returning the completed results.
    ///
    /// A failed launch (e.g. a run already active for that configuration) is
    /// logged and skipped; it does not stop the remaining due configurations.
    pub async fn run_pending(&self) -> Vec<SyncRunResult> {
        let due = self.due_configurations().await;
        if !due.is_empty() {
            debug!(count = due.len(), "Scheduled sync runs due");
        }

        let mut results = Vec::new();
        for config in due {
            if self.engine.registry().has_active_run(config.id).await {
                debug!(configuration = %config.name, "Skipping, run still in flight");
                continue;
            }
            match self.engine.run(config.id, RunOptions::default()).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(
                        configuration = %config.name,
                        error = %e,
                        "Scheduled sync run could not start"
                    );
                }
            }
        }
        results
    }

    /// Spawn the polling loop onto the runtime.
    ///
    /// The loop runs until the returned handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Sync scheduler started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.run_pending().await;
            }
        })
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
