//! Local-id space compaction.
//!
//! Documents parked at high local ids keep the lid space (and the attribute
//! vectors sized by it) bloated after large removals. Each unit of work
//! moves the highest-lid documents downward through the feed pipeline; once
//! nothing sits above the used range, a compact operation shrinks the limit.

use std::{sync::Arc, time::Duration};

use super::{blockable::BlockableState, ExecutionStrategy, JobError, JobOutcome, MaintenanceJob};
use crate::{
    bucket::BucketId,
    config::{BlockableJobConfig, LidSpaceCompactionConfig},
    document::Timestamp,
    executor::BucketExecutor,
    feed::{FeedOperation, OperationStorer},
    handlers::FrozenBucketHandler,
    notifier::Notifiers,
    observability::log_debug,
    subdb::{DocumentLocation, LidUsageStats, MaintenanceSubDb},
};

/// Compacts the local-id space of one sub-database.
///
/// One instance exists per bound sub-database; all instances of a document
/// type share one tracker. Blockable: pauses under disk/memory pressure and
/// stands down while the node is retired.
pub struct LidSpaceCompactionJob {
    config: LidSpaceCompactionConfig,
    sub_db: MaintenanceSubDb,
    storer: Arc<dyn OperationStorer>,
    frozen: Arc<dyn FrozenBucketHandler>,
    executor: BucketExecutor,
    strategy: ExecutionStrategy,
    blockable: BlockableState,
    name: String,
}

impl LidSpaceCompactionJob {
    /// Bind a compaction job to one sub-database.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LidSpaceCompactionConfig,
        blockable_config: BlockableJobConfig,
        sub_db: MaintenanceSubDb,
        doc_type: &str,
        storer: Arc<dyn OperationStorer>,
        frozen: Arc<dyn FrozenBucketHandler>,
        executor: BucketExecutor,
        notifiers: &Notifiers,
        node_retired: bool,
    ) -> Self {
        let name = format!("lid_space_compaction.{doc_type}.{}", sub_db.sub_db());
        let blockable = BlockableState::new(name.clone(), blockable_config, notifiers, node_retired);
        Self {
            config,
            sub_db,
            storer,
            frozen,
            executor,
            strategy: ExecutionStrategy::select(config.use_bucket_executor),
            blockable,
            name,
        }
    }

    fn should_compact(&self, stats: &LidUsageStats) -> bool {
        stats.lid_bloat() >= self.config.allowed_lid_bloat
            && stats.lid_bloat_factor() >= self.config.allowed_lid_bloat_factor
    }

    fn move_operation(&self, doc: &DocumentLocation) -> FeedOperation {
        FeedOperation::MoveDocument {
            document_id: doc.document_id.clone(),
            bucket: doc.bucket,
            lid: doc.lid,
            source: self.sub_db.sub_db(),
            target: self.sub_db.sub_db(),
            timestamp: Timestamp::now(),
        }
    }

    fn run_serial(&mut self, stats: &LidUsageStats) -> JobOutcome {
        let candidates = self.sub_db.meta_store().documents_above(stats.used_lids, 1);
        match candidates.first() {
            Some(doc) => {
                if !self.frozen.is_frozen(doc.bucket) {
                    drop(self.storer.store_operation(self.move_operation(doc)));
                }
                JobOutcome::Ran
            }
            None => {
                self.compact(stats);
                JobOutcome::Ran
            }
        }
    }

    fn run_on_bucket_executor(&mut self, stats: &LidUsageStats) -> JobOutcome {
        let max = self.blockable.max_outstanding_move_ops();
        let candidates = self.sub_db.meta_store().documents_above(stats.used_lids, max);
        if candidates.is_empty() {
            self.compact(stats);
            return JobOutcome::Ran;
        }
        // One task per distinct bucket; tasks for different buckets move in
        // parallel while same-bucket moves stay serialized.
        let mut by_bucket: Vec<(BucketId, Vec<FeedOperation>)> = Vec::new();
        for doc in &candidates {
            let op = self.move_operation(doc);
            match by_bucket.iter_mut().find(|(bucket, _)| *bucket == doc.bucket) {
                Some((_, ops)) => ops.push(op),
                None => by_bucket.push((doc.bucket, vec![op])),
            }
        }
        for (bucket, ops) in by_bucket {
            let storer = Arc::clone(&self.storer);
            self.executor.execute(bucket, async move {
                for op in ops {
                    let _ = storer.store_operation(op).outcome().await;
                }
            });
        }
        JobOutcome::Ran
    }

    fn compact(&self, stats: &LidUsageStats) {
        let lid_limit = stats.highest_used_lid + 1;
        log_debug!(
            component = "maintenance",
            event = "compact_lid_space",
            job = %self.name,
            lid_limit,
        );
        drop(self.storer.store_operation(FeedOperation::CompactLidSpace {
            sub_db: self.sub_db.sub_db(),
            lid_limit,
        }));
    }
}

impl MaintenanceJob for LidSpaceCompactionJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        self.blockable.refresh();
        self.blockable.take_cluster_changed();
        if self.blockable.is_blocked() {
            return Ok(JobOutcome::Blocked);
        }
        // A retired node is being drained; compacting its lid space is
        // wasted write traffic.
        if self.blockable.node_retired() {
            return Ok(JobOutcome::Ran);
        }

        let stats = self.sub_db.meta_store().lid_usage();
        if !self.should_compact(&stats) {
            return Ok(JobOutcome::Ran);
        }
        let outcome = match self.strategy {
            ExecutionStrategy::Serial => self.run_serial(&stats),
            ExecutionStrategy::BucketExecutor => self.run_on_bucket_executor(&stats),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        bucket::BucketLockMap,
        document::DocumentId,
        executor::TokioExecutor,
        feed::{CompletionReceiver, CompletionToken},
        notifier::{ClusterState, DiskMemUsageState},
        subdb::{DocumentMetaStore, SubDbId},
    };

    struct BloatedMetaStore {
        stats: LidUsageStats,
        above: Vec<DocumentLocation>,
    }

    impl DocumentMetaStore for BloatedMetaStore {
        fn lid_usage(&self) -> LidUsageStats {
            self.stats
        }

        fn documents_above(&self, lid_limit: u32, max: usize) -> Vec<DocumentLocation> {
            self.above
                .iter()
                .filter(|doc| doc.lid > lid_limit)
                .take(max)
                .cloned()
                .collect()
        }

        fn removed_documents_older_than(
            &self,
            _cutoff: Timestamp,
            _max: usize,
        ) -> Vec<DocumentLocation> {
            Vec::new()
        }

        fn buckets(&self) -> Vec<BucketId> {
            self.above.iter().map(|doc| doc.bucket).collect()
        }
    }

    #[derive(Default)]
    struct RecordingStorer {
        ops: Mutex<Vec<FeedOperation>>,
    }

    impl OperationStorer for RecordingStorer {
        fn store_operation(&self, op: FeedOperation) -> CompletionReceiver {
            self.ops.lock().unwrap().push(op);
            let (token, rx) = CompletionToken::channel();
            token.complete(Ok(()));
            rx
        }
    }

    struct NoFrozen;

    impl FrozenBucketHandler for NoFrozen {
        fn is_frozen(&self, _bucket: BucketId) -> bool {
            false
        }
    }

    fn doc(lid: u32, bucket_id: u64) -> DocumentLocation {
        DocumentLocation {
            document_id: DocumentId::new(format!("id:test::{lid}")),
            bucket: BucketId::new(16, bucket_id),
            lid,
            timestamp: Timestamp(1),
        }
    }

    fn bloated_stats() -> LidUsageStats {
        LidUsageStats {
            lid_limit: 1000,
            used_lids: 10,
            lowest_free_lid: 2,
            highest_used_lid: 900,
        }
    }

    fn job(
        meta: BloatedMetaStore,
        storer: Arc<RecordingStorer>,
        notifiers: &Notifiers,
        use_bucket_executor: bool,
    ) -> LidSpaceCompactionJob {
        LidSpaceCompactionJob::new(
            LidSpaceCompactionConfig {
                interval: Duration::from_secs(60),
                allowed_lid_bloat: 10,
                allowed_lid_bloat_factor: 0.1,
                use_bucket_executor,
            },
            BlockableJobConfig::default(),
            MaintenanceSubDb::new(SubDbId::Ready, Arc::new(meta)),
            "music",
            storer,
            Arc::new(NoFrozen),
            BucketExecutor::new(Arc::new(TokioExecutor::current()), BucketLockMap::new()),
            notifiers,
            false,
        )
    }

    #[tokio::test]
    async fn serial_strategy_moves_one_document_per_unit() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: bloated_stats(),
            above: vec![doc(900, 1), doc(800, 2)],
        };
        let mut job = job(meta, storer.clone(), &notifiers, false);

        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        let ops = storer.ops.lock().unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], FeedOperation::MoveDocument { lid: 900, .. }));
    }

    #[tokio::test]
    async fn compact_is_issued_once_nothing_sits_above_the_used_range() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: LidUsageStats {
                lid_limit: 1000,
                used_lids: 10,
                lowest_free_lid: 11,
                highest_used_lid: 10,
            },
            above: Vec::new(),
        };
        let mut job = job(meta, storer.clone(), &notifiers, false);

        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        let ops = storer.ops.lock().unwrap();
        assert_eq!(
            ops[0],
            FeedOperation::CompactLidSpace {
                sub_db: SubDbId::Ready,
                lid_limit: 11,
            }
        );
    }

    #[tokio::test]
    async fn healthy_lid_space_is_left_alone() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: LidUsageStats {
                lid_limit: 1000,
                used_lids: 995,
                lowest_free_lid: 996,
                highest_used_lid: 995,
            },
            above: Vec::new(),
        };
        let mut job = job(meta, storer.clone(), &notifiers, false);

        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        assert!(storer.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resource_pressure_blocks_until_released() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: bloated_stats(),
            above: vec![doc(900, 1)],
        };
        let mut job = job(meta, storer.clone(), &notifiers, false);

        notifiers.disk_mem_usage.publish(&DiskMemUsageState {
            disk_usage: 1.5,
            memory_usage: 0.0,
        });
        assert_eq!(job.run().unwrap(), JobOutcome::Blocked);
        assert!(storer.ops.lock().unwrap().is_empty());

        notifiers.disk_mem_usage.publish(&DiskMemUsageState {
            disk_usage: 0.1,
            memory_usage: 0.0,
        });
        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        assert_eq!(storer.ops.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retired_node_does_not_compact() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: bloated_stats(),
            above: vec![doc(900, 1)],
        };
        let mut job = job(meta, storer.clone(), &notifiers, false);

        notifiers.cluster_state.publish(&ClusterState {
            node_retired: true,
            node_maintenance: false,
        });
        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        assert!(storer.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bucket_executor_strategy_dispatches_several_buckets_per_unit() {
        let storer = Arc::new(RecordingStorer::default());
        let notifiers = Notifiers::new();
        let meta = BloatedMetaStore {
            stats: bloated_stats(),
            above: vec![doc(900, 1), doc(800, 2), doc(700, 1)],
        };
        let mut job = job(meta, storer.clone(), &notifiers, true);

        assert_eq!(job.run().unwrap(), JobOutcome::Ran);
        // Tasks run on the shared executor; wait for all three moves.
        for _ in 0..100 {
            if storer.ops.lock().unwrap().len() == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let ops = storer.ops.lock().unwrap();
        assert_eq!(ops.len(), 3, "all candidate documents get a move operation");
    }
}
