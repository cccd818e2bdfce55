use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::workflows::{AutoExecutor, RunnerState};

/// How long a stopping run waits for an in-flight step request
const IN_FLIGHT_GRACE: Duration = Duration::from_secs(10);

/// Graceful shutdown coordinator for long-running session runs
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {}
    }

    /// Resolve once the process receives Ctrl-C
    pub async fn wait_for_signal(&self) -> Result<()> {
        info!("Shutdown coordinator ready - will stop gracefully on Ctrl-C");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        Ok(())
    }

    /// Stop auto-execution, give an outstanding request a grace period, then
    /// log final backend statistics
    pub async fn shutdown_run(executor: AutoExecutor, mut state: watch::Receiver<RunnerState>) -> Result<()> {
        info!("Initiating graceful shutdown of the session run...");
        executor.disable();

        let timed_out = timeout(IN_FLIGHT_GRACE, async {
            // a closed channel means the runner is gone, so nothing is in flight
            let _ = state.wait_for(|state| !state.executing).await;
        })
        .await
        .is_err();

        if timed_out {
            warn!(
                grace_ms = IN_FLIGHT_GRACE.as_millis() as u64,
                "Step request still outstanding; its result will be picked up on the next listing"
            );
        }

        drop(executor);
        crate::observability::backend_metrics().log_stats();
        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
