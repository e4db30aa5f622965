//! Bucket moving between the ready and not-ready sub-databases.
//!
//! The bucket-state calculator decides where each bucket should serve from;
//! this job drains misplaced buckets one bounded batch at a time. Cluster
//! state changes invalidate the pending queue; bucket creation and
//! ready-state flips re-enqueue individual buckets.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use super::{blockable::BlockableState, ExecutionStrategy, JobError, JobOutcome, MaintenanceJob};
use crate::{
    bucket::BucketId,
    config::{BlockableJobConfig, BucketMoveConfig},
    executor::BucketExecutor,
    handlers::{
        BucketModifiedHandler, BucketStateCalculator, DocumentMoveHandler, FrozenBucketHandler,
    },
    notifier::{BucketCreated, BucketStateChange, Notifiers, Subscription},
    observability::{log_debug, log_warn},
    subdb::{MaintenanceSubDb, SubDbId},
};

/// Moves documents of misplaced buckets between the serving sub-databases.
pub struct BucketMoveJob {
    config: BucketMoveConfig,
    calc: Option<Arc<dyn BucketStateCalculator>>,
    move_handler: Arc<dyn DocumentMoveHandler>,
    modified_handler: Arc<dyn BucketModifiedHandler>,
    ready: MaintenanceSubDb,
    not_ready: MaintenanceSubDb,
    frozen: Arc<dyn FrozenBucketHandler>,
    executor: BucketExecutor,
    strategy: ExecutionStrategy,
    blockable: BlockableState,
    bucket_create_sub: Subscription<BucketCreated>,
    bucket_state_sub: Subscription<BucketStateChange>,
    pending: VecDeque<BucketId>,
    name: String,
}

impl BucketMoveJob {
    /// Create the job over both serving sub-databases of `doc_type`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BucketMoveConfig,
        blockable_config: BlockableJobConfig,
        calc: Option<Arc<dyn BucketStateCalculator>>,
        move_handler: Arc<dyn DocumentMoveHandler>,
        modified_handler: Arc<dyn BucketModifiedHandler>,
        ready: MaintenanceSubDb,
        not_ready: MaintenanceSubDb,
        frozen: Arc<dyn FrozenBucketHandler>,
        executor: BucketExecutor,
        notifiers: &Notifiers,
        doc_type: &str,
    ) -> Self {
        let name = format!("bucket_move.{doc_type}");
        let node_retired = calc.as_ref().is_some_and(|c| c.node_retired());
        let blockable = BlockableState::new(name.clone(), blockable_config, notifiers, node_retired);
        Self {
            config,
            calc,
            move_handler,
            modified_handler,
            ready,
            not_ready,
            frozen,
            executor,
            strategy: ExecutionStrategy::select(config.use_bucket_executor),
            blockable,
            bucket_create_sub: notifiers.bucket_create.subscribe(),
            bucket_state_sub: notifiers.bucket_state.subscribe(),
            pending: VecDeque::new(),
            name,
        }
    }

    /// Where the bucket's documents should go, or `None` if it sits right.
    fn placement(&self, bucket: BucketId, in_ready: bool) -> Option<(SubDbId, SubDbId)> {
        let calc = self.calc.as_ref()?;
        let should_be_ready = calc.should_be_ready(bucket) && !self.blockable.node_retired();
        match (in_ready, should_be_ready) {
            (false, true) => Some((SubDbId::NotReady, SubDbId::Ready)),
            (true, false) => Some((SubDbId::Ready, SubDbId::NotReady)),
            _ => None,
        }
    }

    fn scan(&mut self) {
        if self.calc.is_none() {
            return;
        }
        let ready_buckets = self.ready.meta_store().buckets();
        let not_ready_buckets = self.not_ready.meta_store().buckets();
        for bucket in not_ready_buckets {
            if self.placement(bucket, false).is_some() {
                self.pending.push_back(bucket);
            }
        }
        for bucket in ready_buckets {
            if self.placement(bucket, true).is_some() {
                self.pending.push_back(bucket);
            }
        }
    }

    fn in_ready(&self, bucket: BucketId) -> bool {
        self.ready.meta_store().buckets().contains(&bucket)
    }

    fn move_one(&mut self, bucket: BucketId) -> Result<(), JobError> {
        let Some((source, target)) = self.placement(bucket, self.in_ready(bucket)) else {
            return Ok(());
        };
        let outcome =
            self.move_handler
                .move_documents(bucket, source, target, self.config.max_docs_to_move)?;
        log_debug!(
            component = "maintenance",
            event = "bucket_move_batch",
            job = %self.name,
            bucket = %bucket,
            moved = outcome.docs_moved,
            remaining = outcome.docs_remaining,
        );
        if outcome.docs_remaining > 0 {
            self.pending.push_back(bucket);
        } else {
            self.modified_handler.notify_bucket_modified(bucket);
        }
        Ok(())
    }

    fn run_serial(&mut self) -> Result<JobOutcome, JobError> {
        while let Some(bucket) = self.pending.pop_front() {
            if self.frozen.is_frozen(bucket) {
                // Retry after the freeze lifts.
                self.pending.push_back(bucket);
                return Ok(JobOutcome::Ran);
            }
            self.move_one(bucket)?;
            return Ok(JobOutcome::Ran);
        }
        Ok(JobOutcome::Ran)
    }

    fn run_on_bucket_executor(&mut self) -> Result<JobOutcome, JobError> {
        let batch = self.blockable.max_outstanding_move_ops().max(1);
        for _ in 0..batch {
            let Some(bucket) = self.pending.pop_front() else {
                break;
            };
            let Some((source, target)) = self.placement(bucket, self.in_ready(bucket)) else {
                continue;
            };
            let move_handler = Arc::clone(&self.move_handler);
            let modified_handler = Arc::clone(&self.modified_handler);
            let max_docs = self.config.max_docs_to_move;
            self.executor.execute(bucket, async move {
                // Drain the bucket completely while holding its lock.
                loop {
                    match move_handler.move_documents(bucket, source, target, max_docs) {
                        Ok(outcome) if outcome.docs_remaining > 0 && outcome.docs_moved > 0 => {
                            continue
                        }
                        Ok(outcome) if outcome.docs_remaining > 0 => {
                            // No forward progress; release the lock instead of
                            // spinning on a stuck handler.
                            log_warn!(
                                component = "maintenance",
                                event = "bucket_move_stalled",
                                bucket = %bucket,
                                remaining = outcome.docs_remaining,
                            );
                            break;
                        }
                        Ok(_) => {
                            modified_handler.notify_bucket_modified(bucket);
                            break;
                        }
                        Err(err) => {
                            log_warn!(
                                component = "maintenance",
                                event = "bucket_move_failed",
                                bucket = %bucket,
                                error = %err,
                            );
                            break;
                        }
                    }
                }
            });
        }
        Ok(JobOutcome::Ran)
    }
}

impl MaintenanceJob for BucketMoveJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        self.blockable.refresh();
        while let Some(created) = self.bucket_create_sub.try_recv() {
            self.pending.push_back(created.bucket.normalized());
        }
        while let Some(change) = self.bucket_state_sub.try_recv() {
            self.pending.push_back(change.bucket.normalized());
        }
        if self.blockable.take_cluster_changed() {
            // Placement decisions are stale; rebuild from scratch.
            self.pending.clear();
        }
        if self.blockable.is_blocked() {
            return Ok(JobOutcome::Blocked);
        }
        if self.pending.is_empty() {
            self.scan();
        }
        match self.strategy {
            ExecutionStrategy::Serial => self.run_serial(),
            ExecutionStrategy::BucketExecutor => self.run_on_bucket_executor(),
        }
    }
}
