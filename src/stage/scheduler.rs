use std::sync::Arc;
use std::time::Instant;

use subtitle_extract_types::FrameKey;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore, mpsc, oneshot, watch};

use super::task::{Handoff, PipelineTask, TaskContext, TaskReport};

/// Spawns one task per key, never more than `concurrency` segmenting or
/// recognizing at once.
///
/// Each task is linked to its predecessor by a one-shot channel created here,
/// so tasks may finish in any order while handoffs still follow key order.
/// Tasks give their permit back while they wait on that link, so a separate
/// slot bound keeps the number of unreported tasks in check.
pub(crate) struct Scheduler {
    context: Arc<TaskContext>,
    slots: Arc<Semaphore>,
    stop: watch::Receiver<bool>,
}

/// Unreported tasks allowed per concurrency permit.
const SLOTS_PER_PERMIT: usize = 16;

impl Scheduler {
    pub fn new(context: Arc<TaskContext>, concurrency: usize, stop: watch::Receiver<bool>) -> Self {
        Self {
            context,
            slots: Arc::new(Semaphore::new(
                concurrency
                    .saturating_mul(SLOTS_PER_PERMIT)
                    .min(Semaphore::MAX_PERMITS),
            )),
            stop,
        }
    }

    /// Dispatches tasks until the keys run out or a stop is requested, and
    /// returns how many were spawned. Every spawned task sends exactly one
    /// report.
    pub async fn dispatch<I>(self, keys: I, reports: mpsc::Sender<TaskReport>) -> u64
    where
        I: IntoIterator<Item = FrameKey>,
    {
        let (first, mut prev) = oneshot::channel();
        let _ = first.send(Handoff::default());
        let mut dispatched = 0;

        for key in keys {
            let stopped = *self.stop.borrow();
            if stopped {
                break;
            }

            let waiting = Instant::now();
            let (slot, permit) = tokio::select! {
                biased;
                _ = stop_requested(self.stop.clone()) => break,
                acquired = self.acquire() => match acquired {
                    Ok(acquired) => acquired,
                    Err(_) => break,
                },
            };

            let (next, following) = oneshot::channel();
            let task = PipelineTask {
                key,
                prev: std::mem::replace(&mut prev, following),
                next,
                permit,
                idle: waiting.elapsed(),
            };
            let context = Arc::clone(&self.context);
            let reports = reports.clone();
            tokio::spawn(async move {
                let report = task.run(context).await;
                let _ = reports.send(report).await;
                drop(slot);
            });
            dispatched += 1;
        }

        log::debug!("dispatched {dispatched} frame tasks");
        dispatched
    }

    async fn acquire(&self) -> Result<(OwnedSemaphorePermit, OwnedSemaphorePermit), AcquireError> {
        let slot = Arc::clone(&self.slots).acquire_owned().await?;
        let permit = Arc::clone(&self.context.permits).acquire_owned().await?;
        Ok((slot, permit))
    }
}

async fn stop_requested(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
