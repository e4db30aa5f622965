//! Standard job wiring for one document database.
//!
//! `inject_jobs` registers the full maintenance roster on a controller in a
//! fixed order: heartbeat, session-cache pruning, removed-document pruning,
//! lid-space compaction (one job per sub-database: ready, removed,
//! not-ready), bucket moving, attribute-usage sampling. Calling it twice on
//! the same controller registers every job twice.

use std::sync::Arc;

use super::{
    BucketMoveJob, HeartBeatJob, LidSpaceCompactionJob, MaintenanceController,
    PruneRemovedDocumentsJob, PruneSessionCacheJob, SampleAttributeUsageJob, TrackedJob,
};
use crate::{
    config::MaintenanceConfig,
    feed::OperationStorer,
    handlers::{
        AttributeConfigInspector, AttributeManager, AttributeUsageFilter, BucketModifiedHandler,
        BucketStateCalculator, DocumentMoveHandler, FrozenBucketHandler, HeartBeatHandler,
        SessionCachePruner, TransientResourceUsageProvider,
    },
    notifier::Notifiers,
    observability::log_info,
    tracker::JobTrackers,
};

/// Everything the standard job roster needs from the owning database.
pub struct Collaborators {
    /// Keeps idle feed views warm.
    pub heart_beat: Arc<dyn HeartBeatHandler>,
    /// Drops timed-out query sessions.
    pub session_cache_pruner: Arc<dyn SessionCachePruner>,
    /// Moves document batches between sub-databases.
    pub move_handler: Arc<dyn DocumentMoveHandler>,
    /// Told when a bucket finishes moving.
    pub bucket_modified_handler: Arc<dyn BucketModifiedHandler>,
    /// Decides bucket placement; `None` before the first cluster state
    /// arrives, which leaves bucket moving dormant.
    pub calc: Option<Arc<dyn BucketStateCalculator>>,
    /// Buckets currently frozen against maintenance writes.
    pub frozen_buckets: Arc<dyn FrozenBucketHandler>,
    /// Feed entry point for move, compact and prune operations.
    pub operation_storer: Arc<dyn OperationStorer>,
    /// Attribute manager of the ready sub-database.
    pub ready_attribute_manager: Arc<dyn AttributeManager>,
    /// Attribute manager of the not-ready sub-database.
    pub not_ready_attribute_manager: Arc<dyn AttributeManager>,
    /// Receives sampled address-space usage.
    pub attribute_usage_filter: Arc<dyn AttributeUsageFilter>,
    /// Decides whether a document type is sampled at all.
    pub attribute_config_inspector: Arc<dyn AttributeConfigInspector>,
    /// Receives the sampled transient usage total.
    pub transient_usage_provider: Arc<dyn TransientResourceUsageProvider>,
}

/// Register the standard maintenance roster for `doc_type` on `controller`.
pub fn inject_jobs(
    controller: &mut MaintenanceController,
    config: &MaintenanceConfig,
    collaborators: Collaborators,
    notifiers: &Notifiers,
    trackers: &JobTrackers,
    doc_type: &str,
) {
    let node_retired = collaborators
        .calc
        .as_ref()
        .is_some_and(|calc| calc.node_retired());

    controller.register_job_in_master_thread(TrackedJob::new(
        Arc::clone(&trackers.heart_beat),
        Box::new(HeartBeatJob::new(
            collaborators.heart_beat,
            config.heart_beat_interval,
        )),
    ));
    controller.register_job_in_default_pool(TrackedJob::new(
        Arc::clone(&trackers.session_cache_prune),
        Box::new(PruneSessionCacheJob::new(
            collaborators.session_cache_pruner,
            config.session_cache_prune_interval,
        )),
    ));
    controller.register_job_in_master_thread(TrackedJob::new(
        Arc::clone(&trackers.removed_documents_prune),
        Box::new(PruneRemovedDocumentsJob::new(
            config.prune_removed_documents,
            controller.removed_sub_db().clone(),
            doc_type,
            Arc::clone(&collaborators.operation_storer),
            Arc::clone(&collaborators.frozen_buckets),
        )),
    ));

    if !config.lid_space_compaction.is_disabled() {
        let sub_dbs = [
            controller.ready_sub_db().clone(),
            controller.removed_sub_db().clone(),
            controller.not_ready_sub_db().clone(),
        ];
        for sub_db in sub_dbs {
            controller.register_job_in_master_thread(TrackedJob::new(
                Arc::clone(&trackers.lid_space_compact),
                Box::new(LidSpaceCompactionJob::new(
                    config.lid_space_compaction,
                    config.blockable,
                    sub_db,
                    doc_type,
                    Arc::clone(&collaborators.operation_storer),
                    Arc::clone(&collaborators.frozen_buckets),
                    controller.bucket_executor().clone(),
                    notifiers,
                    node_retired,
                )),
            ));
        }
    }

    controller.register_job_in_master_thread(TrackedJob::new(
        Arc::clone(&trackers.bucket_move),
        Box::new(BucketMoveJob::new(
            config.bucket_move,
            config.blockable,
            collaborators.calc,
            collaborators.move_handler,
            collaborators.bucket_modified_handler,
            controller.ready_sub_db().clone(),
            controller.not_ready_sub_db().clone(),
            collaborators.frozen_buckets,
            controller.bucket_executor().clone(),
            notifiers,
            doc_type,
        )),
    ));

    controller.register_job_in_master_thread(TrackedJob::new(
        Arc::clone(&trackers.attribute_usage_sample),
        Box::new(SampleAttributeUsageJob::new(
            collaborators.ready_attribute_manager,
            collaborators.not_ready_attribute_manager,
            collaborators.attribute_usage_filter,
            collaborators.attribute_config_inspector,
            collaborators.transient_usage_provider,
            doc_type,
            config.attribute_usage_sample_interval,
        )),
    ));

    log_info!(
        component = "maintenance",
        event = "jobs_injected",
        doc_type,
        master_jobs = controller.master_job_names().len(),
        pool_jobs = controller.pool_job_names().len(),
    );
}
