//! Job, build and endpoint types shared by the polling loops

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Status of a job or of a single build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Success,
    Unstable,
    Failure,
    Aborted,
    Disabled,
    Unknown,
    Building,
}

impl BuildStatus {
    pub const ALL: [BuildStatus; 7] = [
        BuildStatus::Failure,
        BuildStatus::Unstable,
        BuildStatus::Building,
        BuildStatus::Aborted,
        BuildStatus::Success,
        BuildStatus::Disabled,
        BuildStatus::Unknown,
    ];

    /// Rank used when summarising several statuses; the highest rank wins.
    pub fn precedence(self) -> u8 {
        match self {
            BuildStatus::Failure => 6,
            BuildStatus::Unstable => 5,
            BuildStatus::Building => 4,
            BuildStatus::Aborted => 3,
            BuildStatus::Success => 2,
            BuildStatus::Disabled => 1,
            BuildStatus::Unknown => 0,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: BuildStatus) -> BuildStatus {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    /// Status from a Jenkins job ball colour (`blue`, `red_anime`, ...)
    pub fn from_color(color: &str) -> BuildStatus {
        if color.ends_with("_anime") {
            return BuildStatus::Building;
        }
        match color {
            "blue" | "green" => BuildStatus::Success,
            "red" => BuildStatus::Failure,
            "yellow" => BuildStatus::Unstable,
            "aborted" => BuildStatus::Aborted,
            "disabled" => BuildStatus::Disabled,
            _ => BuildStatus::Unknown,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Unstable => "UNSTABLE",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::Aborted => "ABORTED",
            BuildStatus::Disabled => "DISABLED",
            BuildStatus::Unknown => "UNKNOWN",
            BuildStatus::Building => "BUILDING",
        };
        f.write_str(s)
    }
}

/// State of one job as of the last full poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: String,
    /// `None` for jobs that were never built
    pub build_number: Option<u64>,
    pub status: BuildStatus,
    pub fetched_at_epoch_ms: u64,
}

/// All jobs of one server keyed by job name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobTable {
    jobs: HashMap<String, JobSnapshot>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, replacing any previous entry with the same name
    pub fn insert(&mut self, job: JobSnapshot) {
        self.jobs.insert(job.name.clone(), job);
    }

    pub fn get(&self, name: &str) -> Option<&JobSnapshot> {
        self.jobs.get(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobSnapshot> {
        self.jobs.values()
    }
}

impl FromIterator<JobSnapshot> for JobTable {
    fn from_iter<I: IntoIterator<Item = JobSnapshot>>(iter: I) -> Self {
        let mut table = JobTable::new();
        for job in iter {
            table.insert(job);
        }
        table
    }
}

/// One entry of the recent-activity feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub job_name: String,
    pub build_number: u64,
    pub status: BuildStatus,
    pub published: Option<DateTime<FixedOffset>>,
}

/// A build that finished in failure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildFailureEvent {
    pub job_name: String,
    pub build_number: u64,
}

impl fmt::Display for BuildFailureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}: FAILED", self.job_name, self.build_number)
    }
}

/// User name and API token sent as HTTP basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Connection settings for one configuration epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// Server root without trailing slash
    pub base_url: String,
    pub crumb_required: bool,
    /// Pre-issued crumb; fetched from the server when required and absent
    pub crumb: Option<String>,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl ServerEndpoint {
    /// Absolute URL for a server-relative path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
