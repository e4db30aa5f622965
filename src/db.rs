//! Document database façade shared by the proxy and maintenance machinery.
//!
//! One [`DocumentDb`] per document type. It bundles the feed pipeline
//! handle, the query-side collaborators and the bucket lock table, and gates
//! operation on an online-state signal. Shared ownership is an `Arc`; the
//! last holder dropping the handle releases everything, so there is no
//! retain/release pairing to get wrong.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::{
    bucket::{BucketGuard, BucketId, BucketLockMap, BucketSpace, LockError, LockPolicy},
    feed::{FeedError, FeedHandle},
    handlers::{BucketHandler, ClusterStateHandler},
    observability::log_info,
};

/// Errors from waiting on the database lifecycle.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database was torn down before reaching the online state.
    #[error("document database shut down before coming online")]
    Shutdown,
}

/// Per-document-type database façade.
pub struct DocumentDb {
    name: String,
    bucket_space: BucketSpace,
    feed: FeedHandle,
    bucket_handler: Arc<dyn BucketHandler>,
    cluster_state_handler: Arc<dyn ClusterStateHandler>,
    bucket_locks: BucketLockMap,
    lock_policy: LockPolicy,
    online: watch::Receiver<bool>,
}

impl DocumentDb {
    /// Assemble the façade. Returns the shared handle plus the signal the
    /// owner flips once the database is serving.
    pub fn new(
        name: impl Into<String>,
        bucket_space: BucketSpace,
        feed: FeedHandle,
        bucket_handler: Arc<dyn BucketHandler>,
        cluster_state_handler: Arc<dyn ClusterStateHandler>,
        bucket_locks: BucketLockMap,
        lock_policy: LockPolicy,
    ) -> (Arc<Self>, OnlineSignal) {
        let (tx, online) = watch::channel(false);
        let db = Arc::new(Self {
            name: name.into(),
            bucket_space,
            feed,
            bucket_handler,
            cluster_state_handler,
            bucket_locks,
            lock_policy,
            online,
        });
        (db, OnlineSignal { tx })
    }

    /// Document type this database serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket space this database's buckets live in.
    pub fn bucket_space(&self) -> BucketSpace {
        self.bucket_space
    }

    /// Block until the owner has flipped the database online.
    pub async fn wait_for_online_state(&self) -> Result<(), DbError> {
        let mut rx = self.online.clone();
        loop {
            if *rx.borrow_and_update() {
                return Ok(());
            }
            if rx.changed().await.is_err() {
                return Err(DbError::Shutdown);
            }
        }
    }

    /// Acquire exclusive access to `bucket` under the configured policy.
    pub async fn lock_bucket(&self, bucket: BucketId) -> Result<BucketGuard, LockError> {
        self.bucket_locks.lock(bucket, self.lock_policy).await
    }

    /// Barrier: resolves once all feed work submitted so far is durable.
    pub async fn commit_and_wait(&self) -> Result<(), FeedError> {
        self.feed.fence().wait().await
    }

    pub(crate) fn feed(&self) -> &FeedHandle {
        &self.feed
    }

    pub(crate) fn bucket_handler(&self) -> &Arc<dyn BucketHandler> {
        &self.bucket_handler
    }

    pub(crate) fn cluster_state_handler(&self) -> &Arc<dyn ClusterStateHandler> {
        &self.cluster_state_handler
    }
}

/// Owner-held switch flipping a [`DocumentDb`] online.
pub struct OnlineSignal {
    tx: watch::Sender<bool>,
}

impl OnlineSignal {
    /// Mark the database as serving, releasing `wait_for_online_state`
    /// callers.
    pub fn set_online(&self) {
        if self.tx.send(true).is_ok() {
            log_info!(component = "db", event = "online");
        }
    }
}
