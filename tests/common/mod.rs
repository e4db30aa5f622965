#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use drover::{
    bucket::{BucketId, BucketLockMap},
    document::Timestamp,
    executor::{BucketExecutor, TokioExecutor},
    feed::{FeedError, FeedOperation, FeedSink, OperationStorer},
    handlers::{
        AddressSpaceUsage, AttributeConfigInspector, AttributeManager, AttributeUsageFilter,
        BucketHandler, BucketInfo, BucketModifiedHandler, ClusterStateHandler, DocumentMoveHandler,
        FrozenBucketHandler, HandlerError, HeartBeatHandler, MoveOutcome, SampledAttributeUsage,
        SessionCachePruner, TransientResourceUsageProvider,
    },
    maintenance::{Collaborators, MaintenanceController},
    notifier::ClusterState,
    subdb::{DocumentLocation, DocumentMetaStore, LidUsageStats, MaintenanceSubDb, SubDbId},
};

/// Feed sink keeping every applied operation for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub applied: Mutex<Vec<FeedOperation>>,
    pub reject: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_next(&self, reject: bool) {
        *self.reject.lock().unwrap() = reject;
    }
}

impl FeedSink for RecordingSink {
    fn apply(&self, op: &FeedOperation) -> Result<(), FeedError> {
        self.applied.lock().unwrap().push(op.clone());
        if *self.reject.lock().unwrap() {
            Err(FeedError::Rejected("backend refused".into()))
        } else {
            Ok(())
        }
    }
}

/// Bucket handler over a fixed bucket list, recording mutating calls.
#[derive(Default)]
pub struct RecordingBucketHandler {
    pub buckets: Mutex<Vec<BucketId>>,
    pub active: Mutex<Vec<BucketId>>,
    pub state_calls: Mutex<Vec<(BucketId, bool)>>,
}

impl RecordingBucketHandler {
    pub fn with_buckets(buckets: Vec<BucketId>) -> Arc<Self> {
        Arc::new(Self {
            buckets: Mutex::new(buckets),
            ..Self::default()
        })
    }
}

impl BucketHandler for RecordingBucketHandler {
    fn list_buckets(&self) -> Vec<BucketId> {
        self.buckets.lock().unwrap().clone()
    }

    fn bucket_info(&self, bucket: BucketId) -> BucketInfo {
        let known = self.buckets.lock().unwrap().contains(&bucket);
        BucketInfo {
            doc_count: if known { 1 } else { 0 },
            ..BucketInfo::default()
        }
    }

    fn list_active_buckets(&self) -> Vec<BucketId> {
        self.active.lock().unwrap().clone()
    }

    fn populate_active_buckets(&self, buckets: Vec<BucketId>) {
        *self.active.lock().unwrap() = buckets;
    }

    fn set_active_state(&self, bucket: BucketId, active: bool) {
        self.state_calls.lock().unwrap().push((bucket, active));
        let mut set = self.active.lock().unwrap();
        if active {
            if !set.contains(&bucket) {
                set.push(bucket);
            }
        } else {
            set.retain(|b| *b != bucket);
        }
    }
}

/// Cluster-state handler recording installed states and a modified set.
#[derive(Default)]
pub struct RecordingClusterStateHandler {
    pub states: Mutex<Vec<ClusterState>>,
    pub modified: Mutex<Vec<BucketId>>,
}

impl RecordingClusterStateHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ClusterStateHandler for RecordingClusterStateHandler {
    fn set_cluster_state(&self, state: &ClusterState) {
        self.states.lock().unwrap().push(*state);
    }

    fn modified_buckets(&self) -> Vec<BucketId> {
        std::mem::take(&mut self.modified.lock().unwrap())
    }
}

/// Meta store with no documents at all.
pub struct EmptyMetaStore;

impl DocumentMetaStore for EmptyMetaStore {
    fn lid_usage(&self) -> LidUsageStats {
        LidUsageStats::default()
    }

    fn documents_above(&self, _lid_limit: u32, _max: usize) -> Vec<DocumentLocation> {
        Vec::new()
    }

    fn removed_documents_older_than(&self, _cutoff: Timestamp, _max: usize) -> Vec<DocumentLocation> {
        Vec::new()
    }

    fn buckets(&self) -> Vec<BucketId> {
        Vec::new()
    }
}

struct NoopHeartBeat;

impl HeartBeatHandler for NoopHeartBeat {
    fn heart_beat(&self, _timestamp: Timestamp) {}
}

struct NoopPruner;

impl SessionCachePruner for NoopPruner {
    fn prune_timed_out_sessions(&self, _now: Timestamp) {}
}

struct NoopMove;

impl DocumentMoveHandler for NoopMove {
    fn move_documents(
        &self,
        _bucket: BucketId,
        _source: SubDbId,
        _target: SubDbId,
        _max_docs: usize,
    ) -> Result<MoveOutcome, HandlerError> {
        Ok(MoveOutcome::default())
    }
}

struct NoopModified;

impl BucketModifiedHandler for NoopModified {
    fn notify_bucket_modified(&self, _bucket: BucketId) {}
}

struct NoFrozen;

impl FrozenBucketHandler for NoFrozen {
    fn is_frozen(&self, _bucket: BucketId) -> bool {
        false
    }
}

struct NoopAttributes;

impl AttributeManager for NoopAttributes {
    fn address_space_usage(&self) -> AddressSpaceUsage {
        AddressSpaceUsage::default()
    }

    fn transient_usage(&self) -> u64 {
        0
    }
}

struct NoopFilter;

impl AttributeUsageFilter for NoopFilter {
    fn set_usage(&self, _usage: SampledAttributeUsage) {}
}

struct AlwaysSample;

impl AttributeConfigInspector for AlwaysSample {
    fn should_sample(&self, _doc_type: &str) -> bool {
        true
    }
}

struct NoopTransient;

impl TransientResourceUsageProvider for NoopTransient {
    fn set_transient_usage(&self, _usage: u64) {}
}

/// A controller over empty sub-databases, on the ambient tokio runtime.
pub fn empty_controller() -> MaintenanceController {
    let meta: Arc<dyn DocumentMetaStore> = Arc::new(EmptyMetaStore);
    MaintenanceController::new(
        MaintenanceSubDb::new(SubDbId::Ready, Arc::clone(&meta)),
        MaintenanceSubDb::new(SubDbId::NotReady, Arc::clone(&meta)),
        MaintenanceSubDb::new(SubDbId::Removed, meta),
        BucketExecutor::new(Arc::new(TokioExecutor::current()), BucketLockMap::new()),
    )
}

/// A full collaborator set built from no-op implementations.
pub fn noop_collaborators(storer: Arc<dyn OperationStorer>) -> Collaborators {
    Collaborators {
        heart_beat: Arc::new(NoopHeartBeat),
        session_cache_pruner: Arc::new(NoopPruner),
        move_handler: Arc::new(NoopMove),
        bucket_modified_handler: Arc::new(NoopModified),
        calc: None,
        frozen_buckets: Arc::new(NoFrozen),
        operation_storer: storer,
        ready_attribute_manager: Arc::new(NoopAttributes),
        not_ready_attribute_manager: Arc::new(NoopAttributes),
        attribute_usage_filter: Arc::new(NoopFilter),
        attribute_config_inspector: Arc::new(AlwaysSample),
        transient_usage_provider: Arc::new(NoopTransient),
    }
}
