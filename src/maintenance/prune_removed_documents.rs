//! Removed-document pruning.
//!
//! Tombstones in the removed sub-database only need to survive long enough
//! for the cluster to converge; after `prune_age` they are dropped in
//! bounded batches through the feed pipeline.

use std::{sync::Arc, time::Duration};

use super::{JobError, JobOutcome, MaintenanceJob};
use crate::{
    config::PruneRemovedDocumentsConfig,
    document::Timestamp,
    feed::{FeedOperation, OperationStorer},
    handlers::FrozenBucketHandler,
    observability::log_debug,
    subdb::MaintenanceSubDb,
};

/// Tombstones pruned per unit of work.
const MAX_PRUNE_BATCH: usize = 64;

/// Prunes aged removed-document tombstones from the removed sub-database.
pub struct PruneRemovedDocumentsJob {
    config: PruneRemovedDocumentsConfig,
    sub_db: MaintenanceSubDb,
    storer: Arc<dyn OperationStorer>,
    frozen: Arc<dyn FrozenBucketHandler>,
    name: String,
}

impl PruneRemovedDocumentsJob {
    /// Bind the job to the removed sub-database of `doc_type`.
    pub fn new(
        config: PruneRemovedDocumentsConfig,
        sub_db: MaintenanceSubDb,
        doc_type: &str,
        storer: Arc<dyn OperationStorer>,
        frozen: Arc<dyn FrozenBucketHandler>,
    ) -> Self {
        let name = format!("prune_removed_documents.{doc_type}");
        Self {
            config,
            sub_db,
            storer,
            frozen,
            name,
        }
    }
}

impl MaintenanceJob for PruneRemovedDocumentsJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        let cutoff =
            Timestamp::now().saturating_sub_micros(self.config.prune_age.as_micros() as u64);
        let aged = self
            .sub_db
            .meta_store()
            .removed_documents_older_than(cutoff, MAX_PRUNE_BATCH);

        // Frozen buckets are retried on a later tick.
        let lids: Vec<u32> = aged
            .iter()
            .filter(|doc| !self.frozen.is_frozen(doc.bucket))
            .map(|doc| doc.lid)
            .collect();
        if lids.is_empty() {
            return Ok(JobOutcome::Ran);
        }

        log_debug!(
            component = "maintenance",
            event = "prune_removed_documents",
            job = %self.name,
            pruned = lids.len(),
        );
        drop(
            self.storer
                .store_operation(FeedOperation::PruneRemovedDocuments {
                    sub_db: self.sub_db.sub_db(),
                    lids,
                }),
        );
        Ok(JobOutcome::Ran)
    }
}
