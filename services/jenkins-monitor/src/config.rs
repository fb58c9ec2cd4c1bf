//! Configuration types for the Jenkins monitor

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::{Credentials, ServerEndpoint};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Jobs included in the aggregated health; empty means all jobs
    #[serde(default)]
    pub favorites: Vec<String>,
}

/// Jenkins server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub crumb_required: bool,
    #[serde(default)]
    pub crumb: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Name of an environment variable holding the API token
    #[serde(default)]
    pub api_token_env: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            crumb_required: false,
            crumb: None,
            username: None,
            api_token: None,
            api_token_env: None,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Intervals of the two polling loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_jobs_interval")]
    pub jobs_interval_seconds: u64,
    #[serde(default = "default_feed_interval")]
    pub feed_interval_seconds: u64,
    /// Consecutive failed job fetches before the health is reported as unknown
    #[serde(default = "default_stale_after_failures")]
    pub stale_after_failures: u32,
    /// Upper bound of the exponential backoff; `None` polls at a fixed rate
    #[serde(default)]
    pub max_backoff_seconds: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            jobs_interval_seconds: default_jobs_interval(),
            feed_interval_seconds: default_feed_interval(),
            stale_after_failures: default_stale_after_failures(),
            max_backoff_seconds: None,
        }
    }
}

impl PollingConfig {
    pub fn jobs_interval(&self) -> Duration {
        Duration::from_secs(self.jobs_interval_seconds)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.feed_interval_seconds)
    }

    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff_seconds.map(Duration::from_secs)
    }
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_jobs_interval() -> u64 {
    60
}

fn default_feed_interval() -> u64 {
    30
}

fn default_stale_after_failures() -> u32 {
    1
}

impl Config {
    /// Read `api_token_env` into `api_token`
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        if let Some(var) = &self.server.api_token_env {
            let token = std::env::var(var).map_err(|_| {
                crate::MonitorError::Config(format!(
                    "Environment variable {} for the API token is not set",
                    var
                ))
            })?;
            self.server.api_token = Some(token);
        }
        Ok(())
    }

    /// Check the settings without contacting the server
    pub fn validate(&self) -> crate::Result<()> {
        self.endpoint()?;

        if self.polling.jobs_interval_seconds == 0 || self.polling.feed_interval_seconds == 0 {
            return Err(crate::MonitorError::Config(
                "Polling intervals must be at least one second".to_string(),
            ));
        }
        if self.server.timeout_seconds == 0 {
            return Err(crate::MonitorError::Config(
                "Request timeout must be at least one second".to_string(),
            ));
        }
        if self.polling.stale_after_failures == 0 {
            return Err(crate::MonitorError::Config(
                "stale_after_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the endpoint for one configuration epoch
    pub fn endpoint(&self) -> crate::Result<ServerEndpoint> {
        let server = &self.server;
        let url = reqwest::Url::parse(server.url.trim()).map_err(|e| {
            crate::MonitorError::Config(format!("Invalid server URL {:?}: {}", server.url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(crate::MonitorError::Config(format!(
                "Server URL must use http or https, got {:?}",
                url.scheme()
            )));
        }

        let credentials = match (&server.username, &server.api_token) {
            (Some(username), Some(api_token)) => Some(Credentials {
                username: username.clone(),
                api_token: api_token.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(crate::MonitorError::Config(
                    "username and api_token must be configured together".to_string(),
                ))
            }
        };

        Ok(ServerEndpoint {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            crumb_required: server.crumb_required,
            crumb: server.crumb.clone().filter(|c| !c.is_empty()),
            credentials,
            timeout: Duration::from_secs(server.timeout_seconds),
        })
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::MonitorError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
