use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::interests::aggregator::InterestAggregator;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Pause after a successful cycle.
    pub interval: Duration,
    /// Pause after a failed cycle.
    pub cooldown: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(5),
        }
    }
}

/// Runs refined recomputes forever: recompute, sleep `interval`, repeat.
///
/// A failed cycle is logged and followed by `cooldown` instead of `interval`;
/// the loop itself only ends on shutdown.
pub async fn run_refresh_loop(
    aggregator: Arc<InterestAggregator>,
    settings: RefreshSettings,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(
        interval_secs = settings.interval.as_secs(),
        cooldown_secs = settings.cooldown.as_secs(),
        "Starting interest refresh loop"
    );
    let mut consecutive_failures = 0u32;

    loop {
        let pause = tokio::select! {
            result = aggregator.recompute(true) => match result {
                Ok(report) => {
                    if consecutive_failures > 0 {
                        info!(
                            recovered_after = consecutive_failures,
                            version = report.version,
                            "Refresh recovered after failures"
                        );
                        consecutive_failures = 0;
                    }
                    settings.interval
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!(
                        error = %e,
                        consecutive_failures,
                        "Refresh cycle failed"
                    );
                    warn!(cooldown_secs = settings.cooldown.as_secs(), "Cooling down before retry");
                    settings.cooldown
                }
            },
            _ = shutdown.recv() => break,
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.recv() => break,
        }
    }

    info!("Interest refresh loop stopped");
}
