//! Interval trigger for sync cycles
//!
//! The first cycle starts immediately, later ones on a fixed period. Each
//! cycle is awaited inline, so a slow cycle pushes the next tick back
//! instead of overlapping it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::sync_orchestrator::SyncOrchestrator;
use crate::domain::sync_outcome::CycleReport;

pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    period: Duration,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, period: Duration) -> Self {
        Self {
            orchestrator,
            period,
        }
    }

    pub fn every_minutes(orchestrator: Arc<SyncOrchestrator>, minutes: u64) -> Self {
        Self::new(orchestrator, Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Single cycle, for `--once`
    pub async fn run_once(&self) -> CycleReport {
        self.orchestrator.run_cycle().await
    }

    /// Run cycles until `shutdown` fires. A running cycle is always finished
    /// before the token is checked again. Returns the number of cycles run.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("🛑 Scheduler stopping after {} cycles", cycles);
                    return cycles;
                }
                _ = ticker.tick() => {}
            }

            self.orchestrator.run_cycle().await;
            cycles += 1;
            info!("⏰ Next sync cycle in {} minutes", self.period.as_secs() / 60);
        }
    }
}
