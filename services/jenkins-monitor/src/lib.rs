//! Jenkins monitor - build health aggregation and failure notifications
//!
//! Polls a Jenkins server with two independent loops: a full job listing
//! that drives one aggregated health value, and the recent-builds feed that
//! reports each failed build once.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod io;
pub mod jenkins;
pub mod listener;
pub mod model;
pub mod poller;
pub mod source;

pub use aggregator::{AggregatedHealth, BuildStatusAggregator};
pub use config::{load_config, Config};
pub use coordinator::MonitorCoordinator;
pub use error::{FetchErrorKind, MonitorError, Result};
pub use listener::{FailureListener, LoggingListener, StatusListener};
pub use model::{BuildFailureEvent, BuildStatus, FeedEntry, JobSnapshot, JobTable};

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

fn load_resolved(config_path: &Path) -> Result<Config> {
    let mut config = load_config(config_path)?;
    config.resolve_secrets()?;
    Ok(config)
}

/// Run the monitor until `stop` resolves, reloading the configuration file
/// each time `reload` resolves.
///
/// A configuration that fails to load or verify on reload is logged and the
/// running session is kept.
pub async fn run_service_loop<S, R>(config_path: &Path, stop: S, reload: R) -> Result<()>
where
    S: FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>>,
    R: Fn() -> Pin<Box<dyn Future<Output = ()> + Send>>,
{
    let config = load_resolved(config_path)?;
    let listener = Arc::new(LoggingListener);
    let coordinator = MonitorCoordinator::jenkins(listener.clone(), listener);
    coordinator.start(&config).await?;

    let mut stop = stop();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = reload() => {
                tracing::info!("Reloading configuration from {:?}", config_path);
                match load_resolved(config_path) {
                    Ok(config) => {
                        if let Err(e) = coordinator.reconfigure(&config).await {
                            tracing::error!("Keeping previous configuration: {}", e);
                        }
                    }
                    Err(e) => tracing::error!("Failed to reload configuration: {}", e),
                }
            }
        }
    }

    coordinator.stop().await;
    Ok(())
}
