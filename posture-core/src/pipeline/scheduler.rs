use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::orchestrator::ScanOrchestrator;

/// Periodic full collect-and-scan, driven by the service itself.
#[derive(Debug)]
pub struct ScheduledRunner {
    orchestrator: ScanOrchestrator,
    interval: Duration,
    cancel: CancellationToken,
}

impl ScheduledRunner {
    /// Runner starting a full run every `interval` until `cancel` fires.
    pub fn new(
        orchestrator: ScanOrchestrator,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            cancel,
        }
    }

    /// Runs on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Starts a full run, then sleeps for the interval, until cancelled.
    pub async fn run(self) {
        info!(interval = ?self.interval, "scheduled runner started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.orchestrator.collect_and_scan_all().await {
                Ok(response) => info!(
                    collect_id = %response.collect_id,
                    scan_id = %response.scan_id,
                    "scheduled collect and scan started"
                ),
                Err(err) => error!(error = %err, "scheduled collect and scan"),
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("scheduled runner stopped");
    }
}
