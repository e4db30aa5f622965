//! Session cache pruning.
//!
//! Runs on the default worker pool: pruning has no ordering relationship to
//! any other job and must not occupy the master thread.

use std::{sync::Arc, time::Duration};

use super::{JobError, JobOutcome, MaintenanceJob};
use crate::{document::Timestamp, handlers::SessionCachePruner};

/// Drops timed-out query sessions from the session cache.
pub struct PruneSessionCacheJob {
    pruner: Arc<dyn SessionCachePruner>,
    interval: Duration,
}

impl PruneSessionCacheJob {
    /// Create the job with its pruner and period.
    pub fn new(pruner: Arc<dyn SessionCachePruner>, interval: Duration) -> Self {
        Self { pruner, interval }
    }
}

impl MaintenanceJob for PruneSessionCacheJob {
    fn name(&self) -> &str {
        "prune_session_cache"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        self.pruner.prune_timed_out_sessions(Timestamp::now());
        Ok(JobOutcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingPruner {
        calls: AtomicUsize,
    }

    impl SessionCachePruner for CountingPruner {
        fn prune_timed_out_sessions(&self, _now: Timestamp) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn each_run_prunes_once() {
        let pruner = Arc::new(CountingPruner::default());
        let mut job = PruneSessionCacheJob::new(pruner.clone(), Duration::from_secs(60));
        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        assert_eq!(pruner.calls.load(Ordering::SeqCst), 1);
    }
}
