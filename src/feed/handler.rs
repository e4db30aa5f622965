//! Single-writer dispatch front of the feed pipeline.
//!
//! Durability mechanics live in the injected [`FeedSink`]; this module only
//! guarantees submission-order application and exactly-one completion per
//! token for a single database.

use std::sync::Arc;

use tokio::sync::oneshot;
use ulid::Ulid;

use super::{
    token::{CompletionReceiver, CompletionToken, FeedError},
    FeedOperation,
};
use crate::{
    executor::Executor,
    observability::{log_debug, log_warn},
};

/// Storage backend applying operations in the order they are handed over.
pub trait FeedSink: Send + Sync + 'static {
    /// Apply one operation. An `Err` fails that operation's token only.
    fn apply(&self, op: &FeedOperation) -> Result<(), FeedError>;
}

/// Write access to the feed pipeline, consumed by jobs that store
/// maintenance operations.
pub trait OperationStorer: Send + Sync {
    /// Submit an operation, returning the receiver for its outcome.
    fn store_operation(&self, op: FeedOperation) -> CompletionReceiver;
}

enum FeedMsg {
    Operation {
        id: Ulid,
        op: FeedOperation,
        token: CompletionToken,
    },
    Fence {
        done: oneshot::Sender<()>,
    },
}

/// Submitting half of the feed pipeline. Cheap to clone.
#[derive(Clone)]
pub struct FeedHandle {
    tx: flume::Sender<FeedMsg>,
}

impl FeedHandle {
    /// Submit an operation with its completion token.
    ///
    /// Never fails synchronously: if the pipeline is already gone the token
    /// is dropped, which delivers [`FeedError::PipelineClosed`] to the
    /// receiver asynchronously.
    pub fn submit(&self, op: FeedOperation, token: CompletionToken) {
        let id = Ulid::new();
        let kind = op.kind();
        if self.tx.send(FeedMsg::Operation { id, op, token }).is_err() {
            log_warn!(
                component = "feed",
                event = "submit_after_shutdown",
                op_id = %id,
                kind,
            );
        }
    }

    /// Enqueue a barrier resolving once every earlier submission completed.
    pub fn fence(&self) -> FenceWait {
        let (done, rx) = oneshot::channel();
        let _ = self.tx.send(FeedMsg::Fence { done });
        FenceWait { rx }
    }
}

impl OperationStorer for FeedHandle {
    fn store_operation(&self, op: FeedOperation) -> CompletionReceiver {
        let (token, rx) = CompletionToken::channel();
        self.submit(op, token);
        rx
    }
}

/// Pending barrier from [`FeedHandle::fence`].
pub struct FenceWait {
    rx: oneshot::Receiver<()>,
}

impl FenceWait {
    /// Wait for the barrier to drain.
    pub async fn wait(self) -> Result<(), FeedError> {
        self.rx.await.map_err(|_| FeedError::PipelineClosed)
    }
}

/// Spawn the pipeline task and return its submitting handle.
///
/// The task runs until every handle is dropped, applying operations strictly
/// in submission order. Sink failures complete the affected token with `Err`
/// and never stop the pipeline.
pub fn spawn_feed_pipeline(executor: &dyn Executor, sink: Arc<dyn FeedSink>) -> FeedHandle {
    let (tx, rx) = flume::unbounded();
    executor.spawn(Box::pin(async move {
        while let Ok(msg) = rx.recv_async().await {
            match msg {
                FeedMsg::Operation { id, op, token } => {
                    let result = sink.apply(&op);
                    if let Err(err) = &result {
                        log_warn!(
                            component = "feed",
                            event = "operation_failed",
                            op_id = %id,
                            kind = op.kind(),
                            error = %err,
                        );
                    }
                    token.complete(result);
                }
                FeedMsg::Fence { done } => {
                    let _ = done.send(());
                }
            }
        }
        log_debug!(component = "feed", event = "pipeline_drained");
    }));
    FeedHandle { tx }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{bucket::BucketId, executor::TokioExecutor};

    struct RecordingSink {
        kinds: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kinds: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl FeedSink for RecordingSink {
        fn apply(&self, op: &FeedOperation) -> Result<(), FeedError> {
            self.kinds.lock().unwrap().push(op.kind());
            if self.fail {
                Err(FeedError::Rejected("sink full".into()))
            } else {
                Ok(())
            }
        }
    }

    fn create_bucket(id: u64) -> FeedOperation {
        FeedOperation::CreateBucket {
            bucket: BucketId::new(16, id).normalized(),
        }
    }

    #[tokio::test]
    async fn operations_apply_in_submission_order() {
        let sink = RecordingSink::new(false);
        let handle = spawn_feed_pipeline(&TokioExecutor::current(), sink.clone());

        let first = handle.store_operation(create_bucket(1));
        let second = handle.store_operation(FeedOperation::DeleteBucket {
            bucket: BucketId::new(16, 1),
        });
        assert_eq!(first.outcome().await, Ok(()));
        assert_eq!(second.outcome().await, Ok(()));
        assert_eq!(*sink.kinds.lock().unwrap(), vec!["create_bucket", "delete_bucket"]);
    }

    #[tokio::test]
    async fn sink_failure_fails_only_that_token() {
        let sink = RecordingSink::new(true);
        let handle = spawn_feed_pipeline(&TokioExecutor::current(), sink);

        let rx = handle.store_operation(create_bucket(2));
        assert!(matches!(rx.outcome().await, Err(FeedError::Rejected(_))));

        // Pipeline is still alive afterwards.
        let fence = handle.fence();
        assert_eq!(fence.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn fence_resolves_after_earlier_submissions() {
        let sink = RecordingSink::new(false);
        let handle = spawn_feed_pipeline(&TokioExecutor::current(), sink.clone());

        let rx = handle.store_operation(create_bucket(3));
        let fence = handle.fence();
        fence.wait().await.unwrap();
        assert_eq!(sink.kinds.lock().unwrap().len(), 1);
        assert_eq!(rx.outcome().await, Ok(()));
    }

    #[tokio::test]
    async fn submit_after_shutdown_completes_with_closed() {
        let (tx, rx) = flume::unbounded();
        drop(rx);
        let handle = FeedHandle { tx };
        let lost = handle.store_operation(create_bucket(4));
        assert_eq!(lost.outcome().await, Err(FeedError::PipelineClosed));
    }
}
