use std::collections::BTreeMap;

use futures_util::Stream;
use subtitle_extract_types::{FrameClock, FrameKey};
use tokio::sync::{mpsc, oneshot};

use super::task::TaskReport;
use super::{FrameRecord, PipelineError};

/// Restores key order over task reports.
///
/// Records are released strictly in clock order. Once every task has
/// reported, anything still held is an error unless it lies past the first
/// frame that was found missing.
pub(crate) struct FrameSorter {
    state: SorterState,
}

impl FrameSorter {
    pub fn new(
        clock: FrameClock,
        first: FrameKey,
        reports: mpsc::Receiver<TaskReport>,
        dispatched: oneshot::Receiver<u64>,
    ) -> Self {
        Self {
            state: SorterState {
                reports,
                dispatched: Some(dispatched),
                pool: RecordPool::new(clock, first),
                received: 0,
                ended: None,
                failure: None,
                finished: false,
            },
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<FrameRecord, PipelineError>> {
        futures_util::stream::unfold(self.state, SorterState::next)
    }
}

struct SorterState {
    reports: mpsc::Receiver<TaskReport>,
    dispatched: Option<oneshot::Receiver<u64>>,
    pool: RecordPool,
    received: u64,
    ended: Option<FrameKey>,
    failure: Option<PipelineError>,
    finished: bool,
}

impl SorterState {
    async fn next(
        mut state: SorterState,
    ) -> Option<(Result<FrameRecord, PipelineError>, SorterState)> {
        loop {
            if let Some(record) = state.pool.pop_next() {
                return Some((Ok(record), state));
            }

            if state.finished {
                return None;
            }

            match state.reports.recv().await {
                Some(report) => state.accept(report),
                None => {
                    state.finished = true;
                    return match state.shutdown().await {
                        Ok(()) => None,
                        Err(err) => Some((Err(err), state)),
                    };
                }
            }
        }
    }

    fn accept(&mut self, report: TaskReport) {
        self.received += 1;
        match report {
            TaskReport::Done(record) => {
                if let Err(err) = self.pool.insert(record) {
                    self.fail(err);
                }
            }
            TaskReport::Ended(key) => {
                self.ended = Some(self.ended.map_or(key, |ended| ended.min(key)));
            }
            TaskReport::Failed(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: PipelineError) {
        log::error!("{err}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    async fn shutdown(&mut self) -> Result<(), PipelineError> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }

        if let Some(dispatched) = self.dispatched.take() {
            let dispatched = dispatched.await.map_err(|_| PipelineError::Invariant {
                message: "scheduler exited without reporting".into(),
            })?;
            if dispatched != self.received {
                return Err(PipelineError::Invariant {
                    message: format!(
                        "{dispatched} tasks dispatched but {} reported",
                        self.received
                    ),
                });
            }
        }

        if let Some(ended) = self.ended {
            let dropped = self.pool.discard_after(ended);
            if dropped > 0 {
                log::warn!("dropped {dropped} records after missing frame {ended}");
            }
        }
        match self.pool.first_held() {
            Some(key) => Err(PipelineError::Invariant {
                message: format!(
                    "{} records still held at shutdown, first at {key}, expected {}",
                    self.pool.len(),
                    self.pool.expected()
                ),
            }),
            None => Ok(()),
        }
    }
}

struct RecordPool {
    clock: FrameClock,
    expected: FrameKey,
    pending: BTreeMap<FrameKey, FrameRecord>,
}

impl RecordPool {
    fn new(clock: FrameClock, first: FrameKey) -> Self {
        Self {
            clock,
            expected: first,
            pending: BTreeMap::new(),
        }
    }

    fn insert(&mut self, record: FrameRecord) -> Result<(), PipelineError> {
        let key = record.key;
        if key < self.expected || self.pending.contains_key(&key) {
            return Err(PipelineError::Invariant {
                message: format!("frame {key} reported twice"),
            });
        }
        self.pending.insert(key, record);
        Ok(())
    }

    fn pop_next(&mut self) -> Option<FrameRecord> {
        let record = self.pending.remove(&self.expected)?;
        self.expected = self.clock.advance(self.expected);
        Some(record)
    }

    fn discard_after(&mut self, key: FrameKey) -> usize {
        let before = self.pending.len();
        self.pending.retain(|held, _| *held < key);
        before - self.pending.len()
    }

    fn first_held(&self) -> Option<FrameKey> {
        self.pending.keys().next().copied()
    }

    fn expected(&self) -> FrameKey {
        self.expected
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}
