//! Shared pause/resume state for resource-sensitive jobs.
//!
//! Bucket-move and lid-space-compaction subscribe to the disk/memory and
//! cluster-state notifiers. Signals are drained at the start of each run, so
//! a job observes pressure changes on its next due tick.

use crate::{
    config::BlockableJobConfig,
    notifier::{ClusterState, DiskMemUsageState, Notifiers, Subscription},
    observability::log_info,
};

const BLOCKED_DISK: u8 = 1 << 0;
const BLOCKED_MEMORY: u8 = 1 << 1;

pub(crate) struct BlockableState {
    config: BlockableJobConfig,
    resource_sub: Subscription<DiskMemUsageState>,
    cluster_sub: Subscription<ClusterState>,
    job_name: String,
    blocked: u8,
    node_retired: bool,
    cluster_changed: bool,
}

impl BlockableState {
    pub(crate) fn new(
        job_name: impl Into<String>,
        config: BlockableJobConfig,
        notifiers: &Notifiers,
        node_retired: bool,
    ) -> Self {
        Self {
            config,
            resource_sub: notifiers.disk_mem_usage.subscribe(),
            cluster_sub: notifiers.cluster_state.subscribe(),
            job_name: job_name.into(),
            blocked: 0,
            node_retired,
            cluster_changed: false,
        }
    }

    /// Drain pending notifications. Called at the start of each run.
    pub(crate) fn refresh(&mut self) {
        let was_blocked = self.blocked;
        while let Some(state) = self.resource_sub.try_recv() {
            self.set_reason(
                BLOCKED_DISK,
                state.above_disk_limit(self.config.resource_limit_factor),
            );
            self.set_reason(
                BLOCKED_MEMORY,
                state.above_memory_limit(self.config.resource_limit_factor),
            );
        }
        while let Some(state) = self.cluster_sub.try_recv() {
            self.node_retired = state.node_retired;
            self.cluster_changed = true;
        }
        if was_blocked != self.blocked {
            log_info!(
                component = "maintenance",
                event = if self.blocked != 0 { "job_blocked" } else { "job_unblocked" },
                job = %self.job_name,
            );
        }
    }

    pub(crate) fn is_blocked(&self) -> bool {
        self.blocked != 0
    }

    pub(crate) fn node_retired(&self) -> bool {
        self.node_retired
    }

    /// Whether the cluster state changed since the last call; clears the
    /// flag so eligibility is recomputed exactly once per change.
    pub(crate) fn take_cluster_changed(&mut self) -> bool {
        std::mem::take(&mut self.cluster_changed)
    }

    pub(crate) fn max_outstanding_move_ops(&self) -> usize {
        self.config.max_outstanding_move_ops
    }

    fn set_reason(&mut self, reason: u8, active: bool) {
        if active {
            self.blocked |= reason;
        } else {
            self.blocked &= !reason;
        }
    }
}
