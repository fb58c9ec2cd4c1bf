//! Remote job source trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{FeedEntry, JobTable, ServerEndpoint};

/// Fetches job and build data from the CI server.
///
/// Implementations do not retry; the polling loops decide what a failure
/// means. Errors are classified as `Unreachable`, `AuthFailed` or
/// `MalformedResponse`.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RemoteJobSource: Send + Sync {
    /// Complete job listing with the current status of every job
    async fn fetch_jobs(&self) -> crate::Result<JobTable>;

    /// Latest builds in feed order
    async fn fetch_recent_builds(&self) -> crate::Result<Vec<FeedEntry>>;

    /// Probe the server with the configured credentials
    async fn verify(&self) -> crate::Result<()>;
}

/// Builds a [`RemoteJobSource`] for a configuration epoch
pub trait SourceFactory: Send + Sync {
    fn create(&self, endpoint: &ServerEndpoint) -> crate::Result<Arc<dyn RemoteJobSource>>;
}

impl<F> SourceFactory for F
where
    F: Fn(&ServerEndpoint) -> crate::Result<Arc<dyn RemoteJobSource>> + Send + Sync,
{
    fn create(&self, endpoint: &ServerEndpoint) -> crate::Result<Arc<dyn RemoteJobSource>> {
        self(endpoint)
    }
}
