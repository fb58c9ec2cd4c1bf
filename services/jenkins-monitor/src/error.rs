//! Error types for the Jenkins monitor

use std::fmt;

/// Errors that can occur in the Jenkins monitor
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Jenkins server unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of a failed fetch against the Jenkins server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unreachable,
    AuthFailed,
    MalformedResponse,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Unreachable => write!(f, "unreachable"),
            FetchErrorKind::AuthFailed => write!(f, "auth failed"),
            FetchErrorKind::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

impl MonitorError {
    /// Fetch classification, or `None` for errors that do not come from the server
    pub fn kind(&self) -> Option<FetchErrorKind> {
        match self {
            MonitorError::Unreachable(_) => Some(FetchErrorKind::Unreachable),
            MonitorError::AuthFailed(_) => Some(FetchErrorKind::AuthFailed),
            MonitorError::MalformedResponse(_) => Some(FetchErrorKind::MalformedResponse),
            _ => None,
        }
    }

    /// Map a non-success HTTP status to a classified error
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            401 | 403 => MonitorError::AuthFailed(format!("{} rejected with status {}", url, status)),
            500..=599 => MonitorError::Unreachable(format!("{} returned status {}", url, status)),
            _ => MonitorError::MalformedResponse(format!("{} returned status {}", url, status)),
        }
    }
}

/// Result type alias for Jenkins monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
