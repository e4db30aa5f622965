//! Boundary adapter implementing the persistence-provider contract.
//!
//! One proxy per document database. Write operations become tagged feed
//! operations submitted to the single-writer pipeline; completion is
//! reported later through the caller's token. Query operations delegate
//! straight to the bucket or cluster-state handler and carry no ordering
//! relationship to writes. The proxy validates nothing and stores nothing —
//! it is a pure translation and dispatch step.

use std::sync::Arc;

use crate::{
    bucket::{BucketGuard, BucketId, LockError},
    db::{DbError, DocumentDb},
    document::{Document, DocumentId, DocumentUpdate, Timestamp},
    feed::{CompletionToken, FeedError, FeedOperation},
    handlers::BucketInfo,
    notifier::ClusterState,
};

/// Persistence-provider boundary for one document database.
pub struct PersistenceHandlerProxy {
    db: Arc<DocumentDb>,
}

impl PersistenceHandlerProxy {
    /// Bind a proxy to its database. The proxy shares ownership; the
    /// database stays alive at least as long as any proxy for it.
    pub fn new(db: Arc<DocumentDb>) -> Self {
        Self { db }
    }

    /// Block until the owning database reaches the online state. Must be
    /// called once before any other operation.
    pub async fn initialize(&self) -> Result<(), DbError> {
        self.db.wait_for_online_state().await
    }

    /// Store a document.
    pub fn put(
        &self,
        token: CompletionToken,
        bucket: BucketId,
        timestamp: Timestamp,
        document: Document,
    ) {
        self.db.feed().submit(
            FeedOperation::Put {
                bucket: bucket.normalized(),
                timestamp,
                document,
            },
            token,
        );
    }

    /// Apply a partial update.
    pub fn update(
        &self,
        token: CompletionToken,
        bucket: BucketId,
        timestamp: Timestamp,
        update: DocumentUpdate,
    ) {
        self.db.feed().submit(
            FeedOperation::Update {
                bucket: bucket.normalized(),
                timestamp,
                update,
            },
            token,
        );
    }

    /// Remove a document.
    pub fn remove(
        &self,
        token: CompletionToken,
        bucket: BucketId,
        timestamp: Timestamp,
        document_id: DocumentId,
    ) {
        self.db.feed().submit(
            FeedOperation::Remove {
                bucket: bucket.normalized(),
                timestamp,
                document_id,
            },
            token,
        );
    }

    /// Create an empty bucket.
    pub fn create_bucket(&self, token: CompletionToken, bucket: BucketId) {
        self.db.feed().submit(
            FeedOperation::CreateBucket {
                bucket: bucket.normalized(),
            },
            token,
        );
    }

    /// Delete a bucket and its documents.
    pub fn delete_bucket(&self, token: CompletionToken, bucket: BucketId) {
        self.db.feed().submit(
            FeedOperation::DeleteBucket {
                bucket: bucket.normalized(),
            },
            token,
        );
    }

    /// Split one bucket into two.
    pub fn split(
        &self,
        token: CompletionToken,
        source: BucketId,
        target1: BucketId,
        target2: BucketId,
    ) {
        self.db.feed().submit(
            FeedOperation::SplitBucket {
                source: source.normalized(),
                target1: target1.normalized(),
                target2: target2.normalized(),
            },
            token,
        );
    }

    /// Join two buckets into one.
    pub fn join(
        &self,
        token: CompletionToken,
        source1: BucketId,
        source2: BucketId,
        target: BucketId,
    ) {
        self.db.feed().submit(
            FeedOperation::JoinBuckets {
                source1: source1.normalized(),
                source2: source2.normalized(),
                target: target.normalized(),
            },
            token,
        );
    }

    /// All buckets of this database.
    pub fn list_buckets(&self) -> Vec<BucketId> {
        self.db.bucket_handler().list_buckets()
    }

    /// Info for one bucket.
    pub fn get_bucket_info(&self, bucket: BucketId) -> BucketInfo {
        self.db.bucket_handler().bucket_info(bucket.normalized())
    }

    /// Buckets currently active for serving.
    pub fn list_active_buckets(&self) -> Vec<BucketId> {
        self.db.bucket_handler().list_active_buckets()
    }

    /// Seed the active set during initialization.
    pub fn populate_active_buckets(&self, buckets: Vec<BucketId>) {
        let buckets = buckets.into_iter().map(BucketId::normalized).collect();
        self.db.bucket_handler().populate_active_buckets(buckets);
    }

    /// Flip one bucket's active state.
    pub fn set_active_state(&self, bucket: BucketId, active: bool) {
        self.db
            .bucket_handler()
            .set_active_state(bucket.normalized(), active);
    }

    /// Install a new cluster state.
    pub fn set_cluster_state(&self, state: &ClusterState) {
        self.db.cluster_state_handler().set_cluster_state(state);
    }

    /// Buckets modified since the last call.
    pub fn get_modified_buckets(&self) -> Vec<BucketId> {
        self.db.cluster_state_handler().modified_buckets()
    }

    /// Acquire scoped exclusive access to `bucket` from the owning database.
    pub async fn lock_bucket(&self, bucket: BucketId) -> Result<BucketGuard, LockError> {
        self.db.lock_bucket(bucket).await
    }

    /// Block until all feed work submitted so far is durably committed.
    pub async fn commit_and_wait(&self) -> Result<(), FeedError> {
        self.db.commit_and_wait().await
    }
}
