//! Test doubles shared by the integration and BDD tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use jenkins_monitor::model::ServerEndpoint;
use jenkins_monitor::source::{RemoteJobSource, SourceFactory};
use jenkins_monitor::{
    AggregatedHealth, BuildFailureEvent, BuildStatus, FailureListener, FeedEntry, FetchErrorKind,
    JobSnapshot, JobTable, MonitorError, StatusListener,
};

pub fn error_of(kind: FetchErrorKind) -> MonitorError {
    match kind {
        FetchErrorKind::Unreachable => MonitorError::Unreachable("connection refused".to_string()),
        FetchErrorKind::AuthFailed => MonitorError::AuthFailed("status 401".to_string()),
        FetchErrorKind::MalformedResponse => {
            MonitorError::MalformedResponse("not a Jenkins response".to_string())
        }
    }
}

pub fn job(name: &str, number: u64, status: BuildStatus) -> JobSnapshot {
    JobSnapshot {
        name: name.to_string(),
        build_number: Some(number),
        status,
        fetched_at_epoch_ms: 0,
    }
}

pub fn table(jobs: &[(&str, BuildStatus)]) -> JobTable {
    jobs.iter()
        .enumerate()
        .map(|(i, (name, status))| job(name, i as u64 + 1, *status))
        .collect()
}

pub fn entry(job_name: &str, build_number: u64, status: BuildStatus) -> FeedEntry {
    FeedEntry {
        job_name: job_name.to_string(),
        build_number,
        status,
        published: None,
    }
}

/// Queue of scripted responses. The last response repeats once the
/// queue is down to one item; an empty queue yields the default value.
#[derive(Debug)]
struct Script<T> {
    steps: Mutex<VecDeque<Result<T, FetchErrorKind>>>,
}

impl<T: Clone + Default> Script<T> {
    fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, step: Result<T, FetchErrorKind>) {
        self.steps.lock().unwrap().push_back(step);
    }

    fn replace(&self, step: Result<T, FetchErrorKind>) {
        let mut steps = self.steps.lock().unwrap();
        steps.clear();
        steps.push_back(step);
    }

    fn next(&self) -> jenkins_monitor::Result<T> {
        let mut steps = self.steps.lock().unwrap();
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };
        match step {
            Some(Ok(value)) => Ok(value),
            Some(Err(kind)) => Err(error_of(kind)),
            None => Ok(T::default()),
        }
    }
}

/// Remote job source answering from scripts instead of a server
#[derive(Debug)]
pub struct ScriptedSource {
    jobs: Script<JobTable>,
    feed: Script<Vec<FeedEntry>>,
    verify: Mutex<Option<FetchErrorKind>>,
    jobs_gate: Option<Arc<Notify>>,
    jobs_calls: AtomicUsize,
    feed_calls: AtomicUsize,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            jobs: Script::new(),
            feed: Script::new(),
            verify: Mutex::new(None),
            jobs_gate: None,
            jobs_calls: AtomicUsize::new(0),
            feed_calls: AtomicUsize::new(0),
        }
    }

    /// Every job fetch waits for one `notify_one` on `gate`
    pub fn with_jobs_gate(mut self, gate: Arc<Notify>) -> Self {
        self.jobs_gate = Some(gate);
        self
    }

    pub fn push_jobs(&self, step: Result<JobTable, FetchErrorKind>) {
        self.jobs.push(step);
    }

    pub fn push_feed(&self, step: Result<Vec<FeedEntry>, FetchErrorKind>) {
        self.feed.push(step);
    }

    /// Answer every following job fetch with `step`
    pub fn set_jobs(&self, step: Result<JobTable, FetchErrorKind>) {
        self.jobs.replace(step);
    }

    /// Answer every following feed fetch with `step`
    pub fn set_feed(&self, step: Result<Vec<FeedEntry>, FetchErrorKind>) {
        self.feed.replace(step);
    }

    pub fn fail_verify(&self, kind: FetchErrorKind) {
        *self.verify.lock().unwrap() = Some(kind);
    }

    pub fn jobs_calls(&self) -> usize {
        self.jobs_calls.load(Ordering::SeqCst)
    }

    pub fn feed_calls(&self) -> usize {
        self.feed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteJobSource for ScriptedSource {
    async fn fetch_jobs(&self) -> jenkins_monitor::Result<JobTable> {
        self.jobs_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.jobs_gate {
            gate.notified().await;
        }
        self.jobs.next()
    }

    async fn fetch_recent_builds(&self) -> jenkins_monitor::Result<Vec<FeedEntry>> {
        self.feed_calls.fetch_add(1, Ordering::SeqCst);
        self.feed.next()
    }

    async fn verify(&self) -> jenkins_monitor::Result<()> {
        match *self.verify.lock().unwrap() {
            Some(kind) => Err(error_of(kind)),
            None => Ok(()),
        }
    }
}

/// Factory handing out the same source for every configuration
pub fn shared_factory(source: Arc<ScriptedSource>) -> Arc<dyn SourceFactory> {
    Arc::new(
        move |_: &ServerEndpoint| -> jenkins_monitor::Result<Arc<dyn RemoteJobSource>> {
            Ok(source.clone())
        },
    )
}

/// Factory recording the endpoint of every created source
pub fn recording_factory(
    source: Arc<ScriptedSource>,
    endpoints: Arc<Mutex<Vec<String>>>,
) -> Arc<dyn SourceFactory> {
    Arc::new(
        move |endpoint: &ServerEndpoint| -> jenkins_monitor::Result<Arc<dyn RemoteJobSource>> {
            endpoints.lock().unwrap().push(endpoint.base_url.clone());
            Ok(source.clone())
        },
    )
}

/// Status listener keeping every published value
#[derive(Debug, Default)]
pub struct RecordingStatusListener {
    published: Mutex<Vec<AggregatedHealth>>,
}

impl RecordingStatusListener {
    pub fn published(&self) -> Vec<AggregatedHealth> {
        self.published.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<AggregatedHealth> {
        self.published.lock().unwrap().last().copied()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl StatusListener for RecordingStatusListener {
    fn on_aggregated_health_changed(&self, health: AggregatedHealth) {
        self.published.lock().unwrap().push(health);
    }
}

/// Failure listener keeping every event
#[derive(Debug, Default)]
pub struct RecordingFailureListener {
    events: Mutex<Vec<BuildFailureEvent>>,
}

impl RecordingFailureListener {
    pub fn events(&self) -> Vec<BuildFailureEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl FailureListener for RecordingFailureListener {
    fn on_build_failure(&self, event: &BuildFailureEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
