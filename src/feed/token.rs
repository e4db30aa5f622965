//! Completion tokens for asynchronous operation outcomes.

use thiserror::Error;
use tokio::sync::oneshot;

/// Failure of a submitted feed operation, reported through its token.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The pipeline shut down before the operation completed.
    #[error("feed pipeline closed before the operation completed")]
    PipelineClosed,
    /// The storage backend rejected the operation.
    #[error("operation rejected by the storage backend: {0}")]
    Rejected(String),
}

/// Caller-supplied handle for one feed operation.
///
/// Exactly one completion is delivered per token, always from a pipeline
/// task, never synchronously from the submitting call. Dropping the token
/// without completing it (pipeline teardown) surfaces as
/// [`FeedError::PipelineClosed`] on the receiver.
#[derive(Debug)]
pub struct CompletionToken {
    tx: oneshot::Sender<Result<(), FeedError>>,
}

impl CompletionToken {
    /// Create a token and the receiver observing its outcome.
    pub fn channel() -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, CompletionReceiver { rx })
    }

    /// Deliver the operation outcome. Consumes the token, so a second
    /// completion cannot be sent.
    pub(crate) fn complete(self, result: Result<(), FeedError>) {
        // The caller may have dropped the receiver; that is their choice.
        let _ = self.tx.send(result);
    }
}

/// Observer half of a [`CompletionToken`].
#[derive(Debug)]
pub struct CompletionReceiver {
    rx: oneshot::Receiver<Result<(), FeedError>>,
}

impl CompletionReceiver {
    /// Wait for the operation outcome.
    pub async fn outcome(self) -> Result<(), FeedError> {
        self.rx.await.unwrap_or(Err(FeedError::PipelineClosed))
    }
}
