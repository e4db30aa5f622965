//! Collaborator interfaces consumed by maintenance jobs and the proxy.
//!
//! Everything behind these traits is owned elsewhere: the attribute store,
//! the session cache, the bucket database, the cluster-state machinery. The
//! crate only schedules calls into them.

use thiserror::Error;

use crate::{
    bucket::BucketId,
    document::Timestamp,
    notifier::ClusterState,
    subdb::SubDbId,
};

/// Failure reported by a collaborator call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Receives the periodic heartbeat keeping idle feed views warm.
pub trait HeartBeatHandler: Send + Sync {
    /// One heartbeat with the current wall-clock timestamp.
    fn heart_beat(&self, timestamp: Timestamp);
}

/// Prunes timed-out entries from the query session cache.
pub trait SessionCachePruner: Send + Sync {
    /// Drop sessions that expired before `now`.
    fn prune_timed_out_sessions(&self, now: Timestamp);
}

/// Outcome of one bounded document-move batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Documents moved in this batch.
    pub docs_moved: usize,
    /// Documents still misplaced in the bucket afterwards.
    pub docs_remaining: usize,
}

/// Moves documents of one bucket between sub-databases.
pub trait DocumentMoveHandler: Send + Sync {
    /// Move up to `max_docs` documents of `bucket` from `source` to `target`.
    fn move_documents(
        &self,
        bucket: BucketId,
        source: SubDbId,
        target: SubDbId,
        max_docs: usize,
    ) -> Result<MoveOutcome, HandlerError>;
}

/// Told when a maintenance job finished mutating a bucket, so bucket info
/// can be recomputed and reported upwards.
pub trait BucketModifiedHandler: Send + Sync {
    /// `bucket` changed under maintenance.
    fn notify_bucket_modified(&self, bucket: BucketId);
}

/// Decides bucket placement from the current cluster state.
pub trait BucketStateCalculator: Send + Sync {
    /// Whether this node is being drained out of the cluster.
    fn node_retired(&self) -> bool;

    /// Whether `bucket` should be serving from the ready sub-database.
    fn should_be_ready(&self, bucket: BucketId) -> bool;
}

/// Exposes buckets temporarily frozen by other machinery; sequential job
/// strategies skip frozen buckets and retry later.
pub trait FrozenBucketHandler: Send + Sync {
    /// Whether `bucket` is currently frozen.
    fn is_frozen(&self, bucket: BucketId) -> bool;
}

/// Address-space occupancy of an attribute store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressSpaceUsage {
    /// Slots in use.
    pub used: u64,
    /// Total addressable slots.
    pub limit: u64,
}

impl AddressSpaceUsage {
    /// Usage as a fraction of the limit.
    pub fn usage_ratio(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used as f64 / self.limit as f64
        }
    }
}

/// Attribute manager of one sub-database, sampled by the usage job.
pub trait AttributeManager: Send + Sync {
    /// Aggregated address-space usage across all attributes.
    fn address_space_usage(&self) -> AddressSpaceUsage;

    /// Resource usage that disappears once pending structures settle.
    fn transient_usage(&self) -> u64;
}

/// One attribute-usage sample spanning both serving sub-databases.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampledAttributeUsage {
    /// Usage of the ready sub-database.
    pub ready: AddressSpaceUsage,
    /// Usage of the not-ready sub-database.
    pub not_ready: AddressSpaceUsage,
    /// Combined transient usage.
    pub transient: u64,
}

/// Feed-blocking filter fed by the attribute-usage sampling job.
pub trait AttributeUsageFilter: Send + Sync {
    /// Install the latest sample.
    fn set_usage(&self, usage: SampledAttributeUsage);
}

/// Inspects the current attribute configuration.
pub trait AttributeConfigInspector: Send + Sync {
    /// Whether usage sampling applies to this document type at all.
    fn should_sample(&self, doc_type: &str) -> bool;
}

/// Receives the transient resource usage derived from sampling, consumed by
/// admission control.
pub trait TransientResourceUsageProvider: Send + Sync {
    /// Install the latest transient usage figure.
    fn set_transient_usage(&self, usage: u64);
}

/// Bucket database queries served outside the feed queue.
pub trait BucketHandler: Send + Sync {
    /// All buckets of this database.
    fn list_buckets(&self) -> Vec<BucketId>;

    /// Info for one bucket.
    fn bucket_info(&self, bucket: BucketId) -> BucketInfo;

    /// Buckets currently active for serving.
    fn list_active_buckets(&self) -> Vec<BucketId>;

    /// Seed the active set during initialization.
    fn populate_active_buckets(&self, buckets: Vec<BucketId>);

    /// Flip one bucket's active state.
    fn set_active_state(&self, bucket: BucketId, active: bool);
}

/// Per-bucket bookkeeping returned by [`BucketHandler::bucket_info`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketInfo {
    /// Documents in the bucket.
    pub doc_count: u32,
    /// Total document payload size in bytes.
    pub doc_sizes: u64,
    /// Whether the bucket is in the ready sub-database.
    pub ready: bool,
    /// Whether the bucket is active for serving.
    pub active: bool,
}

/// Cluster-state queries and updates served outside the feed queue.
pub trait ClusterStateHandler: Send + Sync {
    /// Install a new cluster state.
    fn set_cluster_state(&self, state: &ClusterState);

    /// Buckets modified since the last call; drains the modified set.
    fn modified_buckets(&self) -> Vec<BucketId>;
}
