//! Sweeps, background scheduling and shutdown.

use crate::error::Result;
use crate::scheduler::SweepScheduler;
use crate::types::SweepReport;
use tokio::task::JoinHandle;

use super::MagnetBridge;

impl MagnetBridge {
    /// Run one reconciliation sweep now
    ///
    /// # Errors
    /// Returns [`Error::SweepInProgress`](crate::Error::SweepInProgress) if a
    /// sweep (scheduled or manual) is already running.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.reconciler.sweep().await
    }

    /// Whether a sweep is running right now
    pub fn is_sweeping(&self) -> bool {
        self.reconciler.is_sweeping()
    }

    /// Spawn the periodic sweep scheduler, if enabled in configuration
    pub fn start_scheduler(&self) -> Option<JoinHandle<()>> {
        if !self.config.scheduler.enabled {
            tracing::info!("sweep scheduler disabled");
            return None;
        }

        let scheduler = SweepScheduler::new(
            self.reconciler.clone(),
            &self.config.scheduler,
            self.cancel.child_token(),
        );
        Some(tokio::spawn(scheduler.run()))
    }

    /// Stop background tasks started by this bridge
    ///
    /// A sweep that is in flight finishes its current step; no new sweeps start.
    pub fn shutdown(&self) {
        tracing::info!("shutting down magnet bridge");
        self.cancel.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
