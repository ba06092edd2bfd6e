//! Periodic sweep trigger
//!
//! Runs [`Reconciler::sweep`] on a fixed interval until cancelled. A tick that
//! lands while a sweep is still running (a manual sweep through the API, for
//! instance) is skipped rather than queued.

use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::reconcile::Reconciler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Background task that sweeps on an interval
pub struct SweepScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    run_on_start: bool,
    cancel: CancellationToken,
}

impl SweepScheduler {
    /// Create a scheduler; it stops when `cancel` is cancelled
    pub fn new(reconciler: Arc<Reconciler>, config: &SchedulerConfig, cancel: CancellationToken) -> Self {
        Self {
            reconciler,
            interval: config.sweep_interval,
            run_on_start: config.run_on_start,
            cancel,
        }
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "sweep scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick completes immediately
        if !self.run_on_start {
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("sweep scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.reconciler.sweep().await {
            Ok(report) => {
                debug!(
                    subscriptions = report.refresh.total,
                    polled = report.downloads.polled,
                    "scheduled sweep finished"
                );
            }
            Err(Error::SweepInProgress) => {
                info!("previous sweep still running, skipping tick");
            }
            Err(e) => {
                error!(error = %e, "scheduled sweep failed");
            }
        }
    }
}
