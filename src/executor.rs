//! Spawn abstraction and the shared per-bucket task executor.

use std::{future::Future, sync::Arc};

use futures_util::future::BoxFuture;

use crate::bucket::{BucketId, BucketLockMap, LockPolicy};

/// Object-safe spawn abstraction over the async runtime.
///
/// Object safety matters here: the controller, the feed pipeline and the
/// bucket executor all hold `Arc<dyn Executor>`.
pub trait Executor: Send + Sync + 'static {
    /// Spawn a detached task.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// [`Executor`] backed by a tokio runtime handle.
#[derive(Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    /// Wrap an explicit runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context.
    ///
    /// # Panics
    /// Panics outside a tokio runtime, mirroring
    /// [`tokio::runtime::Handle::current`].
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}

/// Shared pool executing per-bucket sub-tasks of maintenance jobs.
///
/// Tasks for distinct buckets run concurrently; tasks touching the same
/// bucket never overlap. Exclusion is enforced through the same lock table
/// [`crate::db::DocumentDb::lock_bucket`] uses, so an executor task also
/// excludes the proxy and vice versa.
#[derive(Clone)]
pub struct BucketExecutor {
    executor: Arc<dyn Executor>,
    locks: BucketLockMap,
}

impl BucketExecutor {
    /// Build an executor over a spawn backend and the shared lock table.
    pub fn new(executor: Arc<dyn Executor>, locks: BucketLockMap) -> Self {
        Self { executor, locks }
    }

    /// Run `task` holding exclusive access to `bucket`.
    ///
    /// Returns as soon as the task is dispatched; the task itself waits for
    /// the bucket to become free.
    pub fn execute<F>(&self, bucket: BucketId, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let locks = self.locks.clone();
        self.executor.spawn(Box::pin(async move {
            let guard = locks
                .lock(bucket, LockPolicy::Wait)
                .await
                .expect("waiting bucket lock cannot fail");
            task.await;
            drop(guard);
        }));
    }

    /// The underlying lock table.
    pub fn locks(&self) -> &BucketLockMap {
        &self.locks
    }
}
