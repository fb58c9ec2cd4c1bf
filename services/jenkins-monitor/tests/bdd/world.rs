//! BDD test world for the Jenkins monitor

use std::sync::Arc;

use cucumber::World;
use jenkins_monitor::feed::FeedWatcher;
use jenkins_monitor::poller::JobPoller;
use jenkins_monitor::{
    AggregatedHealth, BuildStatus, BuildStatusAggregator, Config, FeedEntry, JobSnapshot,
    MonitorCoordinator,
};

use crate::common::{
    shared_factory, RecordingFailureListener, RecordingStatusListener, ScriptedSource,
};

#[derive(Debug, Default, World)]
pub struct JenkinsMonitorWorld {
    pub source: Arc<ScriptedSource>,
    pub status: Arc<RecordingStatusListener>,
    pub failures: Arc<RecordingFailureListener>,

    // Job listing
    pub listed_jobs: Vec<JobSnapshot>,
    pub favorites: Vec<String>,
    pub poller: Option<JobPoller>,
    pub last_health: Option<AggregatedHealth>,

    // Feed
    pub feed: Vec<FeedEntry>,
    pub watcher: Option<FeedWatcher>,

    // Lifecycle
    pub config: Config,
    pub coordinator: Option<MonitorCoordinator>,
    pub published_at_stop: Option<usize>,
    pub last_error: Option<jenkins_monitor::MonitorError>,
}

impl JenkinsMonitorWorld {
    pub fn poller(&mut self) -> &mut JobPoller {
        if self.poller.is_none() {
            self.poller = Some(JobPoller::new(
                self.source.clone(),
                BuildStatusAggregator::new(self.favorites.iter().cloned()),
                self.status.clone(),
                self.config.polling.stale_after_failures,
            ));
        }
        self.poller.as_mut().expect("poller just created")
    }

    pub fn watcher(&mut self) -> &mut FeedWatcher {
        let source = self.source.clone();
        let failures = self.failures.clone();
        self.watcher
            .get_or_insert_with(|| FeedWatcher::new(source, failures))
    }

    pub fn coordinator(&mut self) -> &MonitorCoordinator {
        let source = self.source.clone();
        let status = self.status.clone();
        let failures = self.failures.clone();
        self.coordinator
            .get_or_insert_with(|| MonitorCoordinator::new(shared_factory(source), status, failures))
    }
}

/// Status from its upper-case name, e.g. `FAILURE`
pub fn parse_status(name: &str) -> BuildStatus {
    BuildStatus::ALL
        .into_iter()
        .find(|s| s.to_string() == name)
        .unwrap_or_else(|| panic!("unknown build status {:?}", name))
}

/// Let spawned polling tasks run until they wait on their next tick
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
