//! Maintenance configuration surface.
//!
//! Defaults are serviceable for tests and small deployments; production
//! callers override through the consuming builder methods.

use std::time::Duration;

pub use crate::bucket::LockPolicy;

/// Governs jobs that pause under resource pressure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockableJobConfig {
    /// Disk/memory usage fraction above which blockable jobs pause.
    pub resource_limit_factor: f64,
    /// Upper bound on operations a job keeps in flight per unit of work.
    pub max_outstanding_move_ops: usize,
}

impl Default for BlockableJobConfig {
    fn default() -> Self {
        Self {
            resource_limit_factor: 1.0,
            max_outstanding_move_ops: 10,
        }
    }
}

/// Local-id space compaction settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LidSpaceCompactionConfig {
    /// Time between compaction units per sub-database.
    pub interval: Duration,
    /// Minimum absolute lid bloat before compaction starts.
    pub allowed_lid_bloat: u32,
    /// Minimum relative lid bloat before compaction starts.
    pub allowed_lid_bloat_factor: f64,
    /// Select the parallel per-bucket strategy instead of the sequential one.
    pub use_bucket_executor: bool,
}

impl Default for LidSpaceCompactionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            allowed_lid_bloat: 1_000,
            allowed_lid_bloat_factor: 0.01,
            use_bucket_executor: false,
        }
    }
}

impl LidSpaceCompactionConfig {
    /// A zero interval disables lid-space compaction entirely: no jobs are
    /// created.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

/// Bucket-move settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketMoveConfig {
    /// Time between move units.
    pub interval: Duration,
    /// Documents moved per bucket per unit of work.
    pub max_docs_to_move: usize,
    /// Select the parallel per-bucket strategy instead of the sequential one.
    pub use_bucket_executor: bool,
}

impl Default for BucketMoveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_docs_to_move: 128,
            use_bucket_executor: false,
        }
    }
}

/// Removed-document pruning settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PruneRemovedDocumentsConfig {
    /// Time between prune units.
    pub interval: Duration,
    /// Tombstones younger than this are kept.
    pub prune_age: Duration,
}

impl Default for PruneRemovedDocumentsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            prune_age: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

/// The full per-database maintenance configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MaintenanceConfig {
    /// Heartbeat period.
    pub heart_beat_interval: Duration,
    /// Session-cache prune period.
    pub session_cache_prune_interval: Duration,
    /// Attribute-usage sample period.
    pub attribute_usage_sample_interval: Duration,
    /// Removed-document pruning.
    pub prune_removed_documents: PruneRemovedDocumentsConfig,
    /// Local-id space compaction.
    pub lid_space_compaction: LidSpaceCompactionConfig,
    /// Bucket moving.
    pub bucket_move: BucketMoveConfig,
    /// Resource-pressure behavior of blockable jobs.
    pub blockable: BlockableJobConfig,
    /// Bucket-lock acquisition policy for the proxy.
    pub lock_policy: LockPolicy,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            heart_beat_interval: Duration::from_secs(60),
            session_cache_prune_interval: Duration::from_secs(60),
            attribute_usage_sample_interval: Duration::from_secs(60),
            prune_removed_documents: PruneRemovedDocumentsConfig::default(),
            lid_space_compaction: LidSpaceCompactionConfig::default(),
            bucket_move: BucketMoveConfig::default(),
            blockable: BlockableJobConfig::default(),
            lock_policy: LockPolicy::Wait,
        }
    }
}

impl MaintenanceConfig {
    /// Override the heartbeat period.
    pub fn heart_beat_interval(self, heart_beat_interval: Duration) -> Self {
        Self {
            heart_beat_interval,
            ..self
        }
    }

    /// Override the session-cache prune period.
    pub fn session_cache_prune_interval(self, session_cache_prune_interval: Duration) -> Self {
        Self {
            session_cache_prune_interval,
            ..self
        }
    }

    /// Override the attribute-usage sample period.
    pub fn attribute_usage_sample_interval(self, attribute_usage_sample_interval: Duration) -> Self {
        Self {
            attribute_usage_sample_interval,
            ..self
        }
    }

    /// Override removed-document pruning settings.
    pub fn prune_removed_documents(self, prune_removed_documents: PruneRemovedDocumentsConfig) -> Self {
        Self {
            prune_removed_documents,
            ..self
        }
    }

    /// Override lid-space compaction settings.
    pub fn lid_space_compaction(self, lid_space_compaction: LidSpaceCompactionConfig) -> Self {
        Self {
            lid_space_compaction,
            ..self
        }
    }

    /// Override bucket-move settings.
    pub fn bucket_move(self, bucket_move: BucketMoveConfig) -> Self {
        Self { bucket_move, ..self }
    }

    /// Override blockable-job settings.
    pub fn blockable(self, blockable: BlockableJobConfig) -> Self {
        Self { blockable, ..self }
    }

    /// Override the proxy's bucket-lock policy.
    pub fn lock_policy(self, lock_policy: LockPolicy) -> Self {
        Self { lock_policy, ..self }
    }
}
