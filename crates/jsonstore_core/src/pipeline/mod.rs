//! The commit pipeline.
//!
//! Every mutation of a store handle goes through one background worker:
//!
//! 1. Callers submit a [`Transform`] and receive a [`CommitTicket`].
//! 2. The worker blocks for the first queued request, then drains whatever
//!    else is already queued, up to the batch limit.
//! 3. It re-reads the stored text (not the snapshot, so writes made by other
//!    handles on the same file are seen), parses it once, and applies the
//!    transforms in submission order. A transform that does not apply leaves
//!    the tree as it was and the batch continues.
//! 4. If anything changed, the final tree is written once for the whole
//!    batch, and the snapshot is swapped.
//! 5. Each ticket resolves with its own outcome, or with the persist error if
//!    the write failed.
//!
//! Shutdown closes the queue and waits for the worker to finish what was
//! already submitted.

mod persistence;
mod request;

pub use persistence::Persistence;
pub use request::{CommitTicket, Transform};

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use request::{CommitRequest, CompletionSink};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Counters shared between the pipeline handle and its worker.
#[derive(Debug, Default)]
struct PipelineState {
    /// Submitted requests whose ticket has not been resolved yet.
    in_flight: AtomicUsize,
    /// Batches processed so far.
    batches: AtomicU64,
    /// Batches that ended in a file write.
    writes: AtomicU64,
}

/// Single-writer serializer for one store handle.
pub struct CommitPipeline {
    sender: Mutex<Option<Sender<CommitRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<PipelineState>,
}

impl CommitPipeline {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(persistence: Arc<Persistence>, batch_limit: usize) -> CoreResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(PipelineState::default());
        let worker_state = Arc::clone(&state);
        let batch_limit = batch_limit.max(1);

        let worker = thread::Builder::new()
            .name("jsonstore-commit".to_string())
            .spawn(move || run(&receiver, &persistence, &worker_state, batch_limit))
            .map_err(jsonstore_storage::StorageError::from)?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            state,
        })
    }

    /// Queues a transform. Never blocks.
    pub fn submit(&self, transform: Transform) -> CommitTicket {
        let (request, ticket) = CommitRequest::new(transform);
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return CommitTicket::resolved(Err(CoreError::StoreClosed));
        };

        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::SendError(request)) = sender.send(request) {
            // Worker is gone; the request comes back undelivered.
            self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
            let (_, sink) = request.into_parts();
            sink.complete(Err(CoreError::StoreClosed));
        }
        ticket
    }

    /// Whether submitted work is queued or executing.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Number of batches processed so far.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.state.batches.load(Ordering::SeqCst)
    }

    /// Number of file writes performed so far.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.state.writes.load(Ordering::SeqCst)
    }

    /// Whether the pipeline still accepts work.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stops accepting work, lets the worker drain the queue, and joins it.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("commit worker panicked during shutdown");
            }
        }
    }
}

impl Drop for CommitPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    receiver: &Receiver<CommitRequest>,
    persistence: &Persistence,
    state: &PipelineState,
    batch_limit: usize,
) {
    // recv() fails once every sender is gone and the queue is empty.
    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        while batch.len() < batch_limit {
            match receiver.try_recv() {
                Ok(request) => batch.push(request),
                Err(_) => break,
            }
        }

        let size = batch.len();
        let (transforms, sinks): (Vec<_>, Vec<CompletionSink>) =
            batch.into_iter().map(CommitRequest::into_parts).unzip();
        let (wrote, outcomes) = process_batch(persistence, transforms);

        // Counters settle before any submitter wakes up.
        state.batches.fetch_add(1, Ordering::SeqCst);
        if wrote {
            state.writes.fetch_add(1, Ordering::SeqCst);
        }
        state.in_flight.fetch_sub(size, Ordering::SeqCst);

        for (sink, outcome) in sinks.into_iter().zip(outcomes) {
            sink.complete(outcome);
        }
    }
    debug!(location = %persistence.location(), "commit worker stopped");
}

/// Applies one batch. Returns whether the file was written, and one outcome
/// per transform.
fn process_batch(
    persistence: &Persistence,
    transforms: Vec<Transform>,
) -> (bool, Vec<CoreResult<bool>>) {
    let size = transforms.len();
    let fail_all = |message: String| {
        (0..size)
            .map(|_| Err(CoreError::persist(message.clone())))
            .collect::<Vec<_>>()
    };

    let mut tree = match persistence.load() {
        Ok(tree) => tree,
        Err(e) => {
            warn!(location = %persistence.location(), error = %e, size, "could not load store for batch");
            return (false, fail_all(e.to_string()));
        }
    };

    let outcomes: Vec<CoreResult<bool>> = transforms
        .into_iter()
        .map(|transform| {
            panic::catch_unwind(AssertUnwindSafe(|| transform(&mut tree)))
                .unwrap_or_else(|_| Err(CoreError::invalid_operation("mutation panicked")))
        })
        .collect();

    let applied = outcomes.iter().filter(|o| matches!(o, Ok(true))).count();
    if applied == 0 {
        persistence.replace_snapshot(tree);
        debug!(size, "batch left store unchanged");
        return (false, outcomes);
    }

    match persistence.persist(&tree) {
        Ok(()) => {
            persistence.replace_snapshot(tree);
            debug!(size, applied, "batch committed");
            (true, outcomes)
        }
        Err(e) => {
            warn!(location = %persistence.location(), error = %e, size, "batch persist failed");
            (false, fail_all(e.to_string()))
        }
    }
}
