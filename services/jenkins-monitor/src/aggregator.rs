//! Reduces a set of job statuses to one health value

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{BuildStatus, JobSnapshot, JobTable};

/// Number of jobs per status in an aggregated subset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub success: usize,
    pub unstable: usize,
    pub failure: usize,
    pub aborted: usize,
    pub disabled: usize,
    pub unknown: usize,
    pub building: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: BuildStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: BuildStatus) -> usize {
        match status {
            BuildStatus::Success => self.success,
            BuildStatus::Unstable => self.unstable,
            BuildStatus::Failure => self.failure,
            BuildStatus::Aborted => self.aborted,
            BuildStatus::Disabled => self.disabled,
            BuildStatus::Unknown => self.unknown,
            BuildStatus::Building => self.building,
        }
    }

    pub fn total(&self) -> usize {
        BuildStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: BuildStatus) -> &mut usize {
        match status {
            BuildStatus::Success => &mut self.success,
            BuildStatus::Unstable => &mut self.unstable,
            BuildStatus::Failure => &mut self.failure,
            BuildStatus::Aborted => &mut self.aborted,
            BuildStatus::Disabled => &mut self.disabled,
            BuildStatus::Unknown => &mut self.unknown,
            BuildStatus::Building => &mut self.building,
        }
    }
}

/// Worst status across a job subset, as shown by the status widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: BuildStatus,
    /// Set when the value is not backed by a successful fetch
    pub stale: bool,
    pub counts: StatusCounts,
}

impl AggregatedHealth {
    /// Health of an empty subset
    pub fn unknown() -> Self {
        Self {
            status: BuildStatus::Unknown,
            stale: false,
            counts: StatusCounts::default(),
        }
    }

    /// Indicator pushed once the server can no longer be trusted
    pub fn stale() -> Self {
        Self {
            stale: true,
            ..Self::unknown()
        }
    }

    /// This value flagged as not backed by the latest fetch
    pub fn into_stale(self) -> Self {
        Self {
            stale: true,
            ..self
        }
    }
}

/// Aggregate an arbitrary set of jobs. Total: the empty set yields `UNKNOWN`.
pub fn aggregate<'a, I>(jobs: I) -> AggregatedHealth
where
    I: IntoIterator<Item = &'a JobSnapshot>,
{
    let mut health = AggregatedHealth::unknown();
    for job in jobs {
        health.counts.add(job.status);
        health.status = health.status.worst(job.status);
    }
    health
}

/// Aggregates the configured favorite subset of a [`JobTable`]
#[derive(Debug, Clone, Default)]
pub struct BuildStatusAggregator {
    favorites: HashSet<String>,
}

impl BuildStatusAggregator {
    /// An empty favorite list selects every job in the table
    pub fn new<I, S>(favorites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            favorites: favorites.into_iter().map(Into::into).collect(),
        }
    }

    pub fn includes(&self, job_name: &str) -> bool {
        self.favorites.is_empty() || self.favorites.contains(job_name)
    }

    pub fn aggregate(&self, table: &JobTable) -> AggregatedHealth {
        aggregate(table.jobs().filter(|job| self.includes(&job.name)))
    }
}
