//! Full job listing poll loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{AggregatedHealth, BuildStatusAggregator};
use crate::listener::StatusListener;
use crate::model::JobTable;
use crate::source::RemoteJobSource;

/// Consecutive failures after which a louder warning is logged
const FAILURE_WARN_THRESHOLD: u32 = 5;

/// Periodically replaces the job table and publishes the aggregated health.
///
/// The table is only ever swapped as a whole, so a reader holding the
/// `Arc<JobTable>` from [`JobPoller::table`] or a [`watch::Receiver`] always
/// sees the complete result of one fetch.
pub struct JobPoller {
    source: Arc<dyn RemoteJobSource>,
    aggregator: BuildStatusAggregator,
    listener: Arc<dyn StatusListener>,
    table: watch::Sender<Arc<JobTable>>,
    last_health: Option<AggregatedHealth>,
    consecutive_failures: u32,
    stale_after_failures: u32,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("jobs", &self.table.borrow().len())
            .field("consecutive_failures", &self.consecutive_failures)
            .field("stale_after_failures", &self.stale_after_failures)
            .finish()
    }
}

impl JobPoller {
    pub fn new(
        source: Arc<dyn RemoteJobSource>,
        aggregator: BuildStatusAggregator,
        listener: Arc<dyn StatusListener>,
        stale_after_failures: u32,
    ) -> Self {
        let (table, _) = watch::channel(Arc::new(JobTable::new()));
        Self {
            source,
            aggregator,
            listener,
            table,
            last_health: None,
            consecutive_failures: 0,
            stale_after_failures: stale_after_failures.max(1),
        }
    }

    /// Snapshot of the last successfully fetched table
    pub fn table(&self) -> Arc<JobTable> {
        Arc::clone(&self.table.borrow())
    }

    /// Receiver that observes every table replacement
    pub fn subscribe(&self) -> watch::Receiver<Arc<JobTable>> {
        self.table.subscribe()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run one fetch-and-publish cycle
    pub async fn poll_once(&mut self) -> AggregatedHealth {
        let result = self.source.fetch_jobs().await;
        self.apply(result)
    }

    fn apply(&mut self, result: crate::Result<JobTable>) -> AggregatedHealth {
        let health = match result {
            Ok(table) => {
                let table = Arc::new(table);
                let health = self.aggregator.aggregate(&table);
                self.table.send_replace(table);
                self.consecutive_failures = 0;
                self.last_health = Some(health);
                health
            }
            Err(e) => {
                self.consecutive_failures += 1;
                let kind = e
                    .kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "error".to_string());
                if self.consecutive_failures == 1 {
                    tracing::warn!("Fetching jobs failed ({}): {}", kind, e);
                } else {
                    tracing::debug!("Fetching jobs failed ({}): {}", kind, e);
                }
                if self.consecutive_failures == FAILURE_WARN_THRESHOLD {
                    tracing::warn!(
                        "Job listing has {} consecutive errors",
                        self.consecutive_failures
                    );
                }

                match self.last_health {
                    Some(last) if self.consecutive_failures < self.stale_after_failures => {
                        last.into_stale()
                    }
                    _ => AggregatedHealth::stale(),
                }
            }
        };

        self.listener.on_aggregated_health_changed(health);
        health
    }

    /// Poll until `cancel` fires. An in-flight fetch is abandoned on cancellation
    /// and nothing is published afterwards.
    pub async fn run(
        mut self,
        interval: Duration,
        max_backoff: Option<Duration>,
        cancel: CancellationToken,
    ) {
        loop {
            let result = tokio::select! {
                result = self.source.fetch_jobs() => result,
                _ = cancel.cancelled() => {
                    tracing::debug!("Job poll cancelled during fetch");
                    break;
                }
            };
            if cancel.is_cancelled() {
                break;
            }
            let health = self.apply(result);
            tracing::debug!("Job poll published {:?}", health.status);

            let delay = next_delay(interval, self.consecutive_failures, max_backoff);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Job poll loop cancelled");
                    break;
                }
            }
        }
    }
}

/// Delay before the next tick. Doubles per consecutive failure up to
/// `max_backoff`; without a maximum the interval is fixed.
pub fn next_delay(interval: Duration, failures: u32, max_backoff: Option<Duration>) -> Duration {
    match max_backoff {
        Some(max) if failures > 0 => {
            let factor = 1u32 << failures.min(16);
            interval.saturating_mul(factor).min(max.max(interval))
        }
        _ => interval,
    }
}
