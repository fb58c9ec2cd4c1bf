//! Start, stop and reconfigure the two polling loops

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::aggregator::BuildStatusAggregator;
use crate::config::Config;
use crate::feed::FeedWatcher;
use crate::jenkins::JenkinsSourceFactory;
use crate::listener::{FailureListener, StatusListener};
use crate::model::JobTable;
use crate::poller::JobPoller;
use crate::source::{RemoteJobSource, SourceFactory};
use crate::MonitorError;

/// One monitoring session: both loops started from one configuration.
/// Dropping it cancels both loops.
struct Session {
    config: Config,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    poller: JoinHandle<()>,
    watcher: JoinHandle<()>,
    table: watch::Receiver<Arc<JobTable>>,
}

impl Session {
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.poller.await {
            tracing::warn!("Job poll task ended abnormally: {}", e);
        }
        if let Err(e) = self.watcher.await {
            tracing::warn!("Feed poll task ended abnormally: {}", e);
        }
    }
}

/// Owns the job poller and feed watcher of the current session.
///
/// Every start begins a new session with an empty job table and no seen
/// builds, so nothing carries over between configurations.
pub struct MonitorCoordinator {
    factory: Arc<dyn SourceFactory>,
    status_listener: Arc<dyn StatusListener>,
    failure_listener: Arc<dyn FailureListener>,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for MonitorCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorCoordinator").finish_non_exhaustive()
    }
}

impl MonitorCoordinator {
    pub fn new(
        factory: Arc<dyn SourceFactory>,
        status_listener: Arc<dyn StatusListener>,
        failure_listener: Arc<dyn FailureListener>,
    ) -> Self {
        Self {
            factory,
            status_listener,
            failure_listener,
            session: Mutex::new(None),
        }
    }

    /// Coordinator talking to a real Jenkins server over HTTP
    pub fn jenkins(
        status_listener: Arc<dyn StatusListener>,
        failure_listener: Arc<dyn FailureListener>,
    ) -> Self {
        Self::new(
            Arc::new(JenkinsSourceFactory::default()),
            status_listener,
            failure_listener,
        )
    }

    /// Schedule both loops and return without waiting for their first results
    pub async fn start(&self, config: &Config) -> crate::Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }
        let source = self.create_source(config)?;
        *session = Some(self.spawn(config, source));
        Ok(())
    }

    /// Cancel both loops and wait for them to finish. No-op when not running.
    pub async fn stop(&self) {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => {
                session.shutdown().await;
                tracing::info!("Jenkins monitor stopped");
            }
            None => tracing::debug!("Stop requested but monitor is not running"),
        }
    }

    /// Replace the running session with one for `config`.
    ///
    /// The new configuration is validated and probed first. Invalid settings,
    /// rejected credentials and non-Jenkins endpoints are returned to the
    /// caller and the current session keeps running. An unreachable server
    /// is not an error; the loops keep retrying.
    pub async fn reconfigure(&self, config: &Config) -> crate::Result<()> {
        let source = self.create_source(config)?;
        match source.verify().await {
            Ok(()) => tracing::debug!("Verified {}", config.server.url),
            Err(e @ MonitorError::Unreachable(_)) => {
                tracing::warn!("Server not reachable, starting anyway: {}", e);
            }
            Err(e) => return Err(e),
        }

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.shutdown().await;
        }
        *session = Some(self.spawn(config, source));
        tracing::info!("Jenkins monitor reconfigured for {}", config.server.url);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Last job table of the running session
    pub async fn job_table(&self) -> Option<Arc<JobTable>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| Arc::clone(&s.table.borrow()))
    }

    /// Configuration of the running session
    pub async fn config(&self) -> Option<Config> {
        self.session.lock().await.as_ref().map(|s| s.config.clone())
    }

    fn create_source(&self, config: &Config) -> crate::Result<Arc<dyn RemoteJobSource>> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        self.factory.create(&endpoint)
    }

    fn spawn(&self, config: &Config, source: Arc<dyn RemoteJobSource>) -> Session {
        let cancel = CancellationToken::new();
        let polling = &config.polling;

        let poller = JobPoller::new(
            Arc::clone(&source),
            BuildStatusAggregator::new(config.favorites.iter().cloned()),
            Arc::clone(&self.status_listener),
            polling.stale_after_failures,
        );
        let table = poller.subscribe();
        let watcher = FeedWatcher::new(source, Arc::clone(&self.failure_listener));

        let poller = tokio::spawn(poller.run(
            polling.jobs_interval(),
            polling.max_backoff(),
            cancel.clone(),
        ));
        let watcher = tokio::spawn(watcher.run(
            polling.feed_interval(),
            polling.max_backoff(),
            cancel.clone(),
        ));

        tracing::info!(
            "Jenkins monitor started for {} (jobs every {}s, feed every {}s, {} favorites)",
            config.server.url,
            polling.jobs_interval_seconds,
            polling.feed_interval_seconds,
            config.favorites.len()
        );

        Session {
            config: config.clone(),
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            poller,
            watcher,
            table,
        }
    }
}
