use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::CResult;

/// A message carrying a batch plus a one-shot channel the worker signals
/// once the batch is durable.
struct Submission<B> {
    batch: B,
    ack: Sender<CResult<()>>,
}

/// One durable write queue, drained by a single dedicated worker thread.
///
/// `MvccStore` runs two of these (lock-write, data-write); both are
/// instances of this same generic pipeline, parameterized by the closure
/// that actually applies a batch. A submitter blocks until its batch's
/// durability ack arrives, and batches within one pipeline are always
/// applied in submission order because there is exactly one worker.
pub struct Pipeline<B: Send + 'static> {
    tx: Sender<Submission<B>>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Send + 'static> Pipeline<B> {
    /// Spawns the worker thread. `apply` performs the actual durable write
    /// for one batch; its `Err` is propagated back to every submitter of
    /// that batch via the ack channel.
    pub fn spawn<F>(mut apply: F) -> Self
    where
        F: FnMut(B) -> CResult<()> + Send + 'static,
    {
        let (tx, rx): (Sender<Submission<B>>, Receiver<Submission<B>>) = crossbeam_channel::unbounded();
        let worker = std::thread::spawn(move || {
            for submission in rx {
                let result = apply(submission.batch);
                // The submitter may have given up waiting; a closed ack
                // channel is not a pipeline failure.
                let _ = submission.ack.send(result);
            }
        });
        Pipeline { tx, worker: Some(worker) }
    }

    /// Submits a batch and blocks until it is durable (or the pipeline
    /// reports a failure applying it).
    pub fn submit(&self, batch: B) -> CResult<()> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Submission { batch, ack: ack_tx })
            .map_err(|_| crate::error::Error::Engine("write pipeline worker has shut down".into()))?;
        ack_rx.recv().map_err(|_| crate::error::Error::Engine("write pipeline worker dropped the ack".into()))?
    }

    /// Signals the worker to stop once its queue drains, and waits for it.
    pub fn shutdown(mut self) {
        // Dropping `tx` closes the channel; the worker's `for` loop over
        // `rx` then ends once every already-queued batch is applied.
        drop(std::mem::replace(&mut self.tx, crossbeam_channel::unbounded().0));
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
