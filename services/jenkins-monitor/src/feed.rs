//! Recent-activity feed loop and failure de-duplication

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::listener::FailureListener;
use crate::model::{BuildFailureEvent, BuildStatus, FeedEntry};
use crate::poller::next_delay;
use crate::source::RemoteJobSource;

/// Highest build number already handled per job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenBuilds {
    latest: HashMap<String, u64>,
}

impl SeenBuilds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_name: &str) -> Option<u64> {
        self.latest.get(job_name).copied()
    }

    /// Record `build_number` for `job_name` if it is newer than anything seen.
    /// Returns whether the build was new.
    pub fn observe(&mut self, job_name: &str, build_number: u64) -> bool {
        match self.latest.get_mut(job_name) {
            Some(latest) if *latest >= build_number => false,
            Some(latest) => {
                *latest = build_number;
                true
            }
            None => {
                self.latest.insert(job_name.to_string(), build_number);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Polls the recent-builds feed and reports each failed build once.
///
/// Entries still in progress are not recorded, so a build first seen running
/// is still reported when it later appears as failed.
pub struct FeedWatcher {
    source: Arc<dyn RemoteJobSource>,
    listener: Arc<dyn FailureListener>,
    seen: SeenBuilds,
    consecutive_failures: u32,
}

impl std::fmt::Debug for FeedWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedWatcher")
            .field("seen", &self.seen)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish()
    }
}

impl FeedWatcher {
    pub fn new(source: Arc<dyn RemoteJobSource>, listener: Arc<dyn FailureListener>) -> Self {
        Self {
            source,
            listener,
            seen: SeenBuilds::new(),
            consecutive_failures: 0,
        }
    }

    pub fn seen(&self) -> &SeenBuilds {
        &self.seen
    }

    /// Diff a batch against the seen builds, in feed order.
    /// Returns the failure events the batch produces without notifying.
    pub fn process(&mut self, entries: Vec<FeedEntry>) -> Vec<BuildFailureEvent> {
        let mut events = Vec::new();
        for entry in entries {
            if entry.status == BuildStatus::Building {
                continue;
            }
            if !self.seen.observe(&entry.job_name, entry.build_number) {
                continue;
            }
            tracing::debug!(
                "New build {}#{} ({})",
                entry.job_name,
                entry.build_number,
                entry.status
            );
            if entry.status == BuildStatus::Failure {
                events.push(BuildFailureEvent {
                    job_name: entry.job_name,
                    build_number: entry.build_number,
                });
            }
        }
        events
    }

    /// Run one fetch-and-notify cycle. On a fetch error nothing changes.
    pub async fn poll_once(&mut self) -> crate::Result<Vec<BuildFailureEvent>> {
        let result = self.source.fetch_recent_builds().await;
        self.apply(result)
    }

    fn apply(
        &mut self,
        result: crate::Result<Vec<FeedEntry>>,
    ) -> crate::Result<Vec<BuildFailureEvent>> {
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::warn!(
                    "Fetching recent builds failed ({}): {}",
                    e.kind()
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "error".to_string()),
                    e
                );
                return Err(e);
            }
        };
        self.consecutive_failures = 0;

        let events = self.process(entries);
        for event in &events {
            self.listener.on_build_failure(event);
        }
        Ok(events)
    }

    /// Poll until `cancel` fires. An in-flight fetch is abandoned on cancellation
    /// and no event is emitted afterwards.
    pub async fn run(
        mut self,
        interval: Duration,
        max_backoff: Option<Duration>,
        cancel: CancellationToken,
    ) {
        loop {
            let result = tokio::select! {
                result = self.source.fetch_recent_builds() => result,
                _ = cancel.cancelled() => {
                    tracing::debug!("Feed poll cancelled during fetch");
                    break;
                }
            };
            if cancel.is_cancelled() {
                break;
            }
            if let Ok(events) = self.apply(result) {
                tracing::debug!("Feed poll emitted {} failure events", events.len());
            }

            let delay = next_delay(interval, self.consecutive_failures, max_backoff);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Feed poll loop cancelled");
                    break;
                }
            }
        }
    }
}
