//! Periodic heartbeat keeping idle feed views warm.

use std::{sync::Arc, time::Duration};

use super::{JobError, JobOutcome, MaintenanceJob};
use crate::{document::Timestamp, handlers::HeartBeatHandler};

/// Ticks the heartbeat handler with the current wall-clock time.
pub struct HeartBeatJob {
    handler: Arc<dyn HeartBeatHandler>,
    interval: Duration,
}

impl HeartBeatJob {
    /// Create the job with its handler and period.
    pub fn new(handler: Arc<dyn HeartBeatHandler>, interval: Duration) -> Self {
        Self { handler, interval }
    }
}

impl MaintenanceJob for HeartBeatJob {
    fn name(&self) -> &str {
        "heart_beat"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        self.handler.heart_beat(Timestamp::now());
        Ok(JobOutcome::Ran)
    }
}
