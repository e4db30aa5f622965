//! Periodic maintenance jobs and their scheduling.
//!
//! Every job implements the same contract: the controller invokes `run()`
//! once the configured interval has elapsed since the last completed run,
//! and each invocation performs one bounded unit of work designed to
//! interleave with live feed traffic. Failures are isolated per invocation.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::Instant;

use crate::{feed::FeedError, handlers::HandlerError, tracker::JobTracker};

pub(crate) mod blockable;
mod bucket_move;
mod controller;
mod heart_beat;
mod injector;
mod lid_space_compaction;
mod prune_removed_documents;
mod prune_session_cache;
mod sample_attribute_usage;

pub use bucket_move::BucketMoveJob;
pub use controller::MaintenanceController;
pub use heart_beat::HeartBeatJob;
pub use injector::{inject_jobs, Collaborators};
pub use lid_space_compaction::LidSpaceCompactionJob;
pub use prune_removed_documents::PruneRemovedDocumentsJob;
pub use prune_session_cache::PruneSessionCacheJob;
pub use sample_attribute_usage::SampleAttributeUsageJob;

/// What one job invocation accomplished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// One unit of work was performed (possibly empty).
    Ran,
    /// Work was skipped because the job is paused by resource pressure.
    Blocked,
    /// The job is permanently done and must be descheduled.
    Finished,
}

/// Failure of one job invocation. The job stays scheduled.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum JobError {
    /// The feed pipeline refused an operation.
    #[error("feed pipeline unavailable: {0}")]
    Feed(#[from] FeedError),
    /// A collaborator call failed.
    #[error("handler failure: {0}")]
    Handler(#[from] HandlerError),
}

/// Periodic unit-of-work contract consumed by the controller.
pub trait MaintenanceJob: Send {
    /// Stable job name, unique within one controller.
    fn name(&self) -> &str;

    /// Time between completed runs.
    fn interval(&self) -> Duration;

    /// Perform one bounded unit of work.
    fn run(&mut self) -> Result<JobOutcome, JobError>;
}

/// Due-ness bookkeeping for one registered job.
///
/// A fresh schedule counts registration time as the last run, so the first
/// invocation happens one interval after start. Instants come from the tokio
/// clock so paused-clock tests drive scheduling deterministically.
#[derive(Debug)]
pub(crate) struct JobSchedule {
    interval: Duration,
    last_run: Instant,
}

impl JobSchedule {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_run: now,
        }
    }

    /// True once the interval has elapsed since the last completed run.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_run) >= self.interval
    }

    /// Earliest instant at which the job becomes due.
    pub(crate) fn next_due(&self) -> Instant {
        self.last_run + self.interval
    }

    /// Record a completed run.
    pub(crate) fn mark_run(&mut self, now: Instant) {
        self.last_run = now;
    }
}

/// Decorator bumping a shared [`JobTracker`] around each run.
pub struct TrackedJob {
    tracker: Arc<JobTracker>,
    inner: Box<dyn MaintenanceJob>,
}

impl TrackedJob {
    /// Wrap `inner`, counting its runs on `tracker`.
    pub fn new(tracker: Arc<JobTracker>, inner: Box<dyn MaintenanceJob>) -> Box<Self> {
        Box::new(Self { tracker, inner })
    }
}

impl MaintenanceJob for TrackedJob {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn interval(&self) -> Duration {
        self.inner.interval()
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        self.tracker.job_started();
        let outcome = self.inner.run();
        if outcome.is_ok() {
            self.tracker.job_completed();
        }
        outcome
    }
}

/// How a job family decomposes its unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One bucket at a time on the master thread; strictest ordering.
    Serial,
    /// Independent per-bucket tasks on the shared bucket executor.
    BucketExecutor,
}

impl ExecutionStrategy {
    pub(crate) fn select(use_bucket_executor: bool) -> Self {
        if use_bucket_executor {
            ExecutionStrategy::BucketExecutor
        } else {
            ExecutionStrategy::Serial
        }
    }
}
