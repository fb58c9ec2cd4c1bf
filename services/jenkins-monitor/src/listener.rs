//! Push interfaces implemented by the host

use crate::aggregator::AggregatedHealth;
use crate::model::BuildFailureEvent;

/// Receives the aggregated health after every full job poll.
///
/// Called from the polling task; implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait StatusListener: Send + Sync {
    fn on_aggregated_health_changed(&self, health: AggregatedHealth);
}

/// Receives one event per failed build
#[cfg_attr(test, mockall::automock)]
pub trait FailureListener: Send + Sync {
    fn on_build_failure(&self, event: &BuildFailureEvent);
}

/// Writes health changes and failures to the log
#[derive(Debug, Default)]
pub struct LoggingListener;

impl StatusListener for LoggingListener {
    fn on_aggregated_health_changed(&self, health: AggregatedHealth) {
        if health.stale {
            tracing::info!("Build health: {} (stale)", health.status);
        } else {
            tracing::info!(
                "Build health: {} ({} failed, {} unstable, {} succeeded)",
                health.status,
                health.counts.failure,
                health.counts.unstable,
                health.counts.success
            );
        }
    }
}

impl FailureListener for LoggingListener {
    fn on_build_failure(&self, event: &BuildFailureEvent) {
        tracing::warn!("{}", event);
    }
}
