//! Commit requests and their completion tickets.

use crate::error::{CoreError, CoreResult};
use crate::tree::Tree;
use tokio::sync::oneshot;

/// A state change applied by the commit worker to the latest stored tree.
///
/// Returns `Ok(true)` when it changed the tree, `Ok(false)` when its
/// precondition did not hold. A transform that returns `Ok(false)` or an
/// error must leave the tree untouched.
pub type Transform = Box<dyn FnOnce(&mut Tree) -> CoreResult<bool> + Send + 'static>;

/// One queued mutation: the change plus the sink that reports its outcome.
pub(crate) struct CommitRequest {
    transform: Transform,
    sink: oneshot::Sender<CoreResult<bool>>,
}

impl CommitRequest {
    /// Creates a request and the ticket its submitter waits on.
    pub(crate) fn new(transform: Transform) -> (Self, CommitTicket) {
        let (sink, receiver) = oneshot::channel();
        (Self { transform, sink }, CommitTicket { receiver })
    }

    /// Splits the request so the transform can run before the sink fires.
    pub(crate) fn into_parts(self) -> (Transform, CompletionSink) {
        (self.transform, CompletionSink { sink: self.sink })
    }
}

/// Reports the outcome of one request, exactly once.
pub(crate) struct CompletionSink {
    sink: oneshot::Sender<CoreResult<bool>>,
}

impl CompletionSink {
    pub(crate) fn complete(self, outcome: CoreResult<bool>) {
        // The submitter may have stopped waiting; the commit stands anyway.
        let _ = self.sink.send(outcome);
    }
}

/// Handle on a submitted mutation.
///
/// Dropping the ticket stops waiting but does not cancel the mutation.
#[must_use = "a ticket must be waited on to learn whether the mutation applied"]
pub struct CommitTicket {
    receiver: oneshot::Receiver<CoreResult<bool>>,
}

impl CommitTicket {
    /// A ticket that is already resolved.
    pub(crate) fn resolved(outcome: CoreResult<bool>) -> Self {
        let (sink, receiver) = oneshot::channel();
        let _ = sink.send(outcome);
        Self { receiver }
    }

    /// Blocks the calling thread until the mutation was processed.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`wait_async`](Self::wait_async) there.
    ///
    /// # Errors
    ///
    /// Returns the persist error of the batch, the transform's own error,
    /// or [`CoreError::StoreClosed`] if the worker went away.
    pub fn wait(self) -> CoreResult<bool> {
        self.receiver
            .blocking_recv()
            .map_err(|_| CoreError::StoreClosed)?
    }

    /// Waits for the mutation without blocking a thread.
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn wait_async(self) -> CoreResult<bool> {
        self.receiver.await.map_err(|_| CoreError::StoreClosed)?
    }
}
