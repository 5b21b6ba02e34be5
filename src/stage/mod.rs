//! Recognition pipeline: bounded-concurrency per-frame tasks chained by
//! one-shot handoffs, an order-restoring aggregator and the segment merger.

mod merge;
mod scheduler;
mod sorter;
mod task;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use subtitle_extract_frames::{FrameError, FrameSource};
use subtitle_extract_ocr::{OcrEngine, Replacer, SerialOcr};
use subtitle_extract_segment::{RegionFormat, Segmenter};
use subtitle_extract_types::{FrameClock, FrameKey, RelativeValue};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, oneshot, watch};

pub use merge::{Run, RunCollapser, SegmentMerger, merge_records};

use crate::subtitle::SubtitleSegment;
use scheduler::Scheduler;
use sorter::FrameSorter;
use task::TaskContext;

const REPORT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("concurrency must be at least 1")]
    Concurrency,
    #[error("failed to load frame {key}: {source}")]
    Frame {
        key: FrameKey,
        #[source]
        source: FrameError,
    },
    #[error("task for frame {key} failed: {message}")]
    Task { key: FrameKey, message: String },
    #[error("pipeline invariant violated: {message}")]
    Invariant { message: String },
}

/// How a frame's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// No candidate text pixels survived segmentation.
    Empty,
    /// Region close enough to the predecessor's to reuse its text.
    Cached,
    Recognized,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Empty => "EMPTY",
            TaskStatus::Cached => "CACHE",
            TaskStatus::Recognized => "RESUL",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one frame task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub key: FrameKey,
    pub status: TaskStatus,
    pub text: String,
    /// Time spent waiting for a permit and for the predecessor.
    pub idle: Duration,
}

/// Per-frame OCR over a key range, reassembled into subtitle segments.
pub struct OcrPipeline {
    segmenter: Arc<Segmenter>,
    frames: Arc<dyn FrameSource>,
    engine: Arc<dyn OcrEngine>,
    replacer: Arc<Replacer>,
    cache: RelativeValue,
    format: RegionFormat,
    concurrency: usize,
    clock: FrameClock,
}

impl OcrPipeline {
    /// Engine calls are serialized regardless of the concurrency level.
    pub fn new(
        segmenter: Segmenter,
        frames: Arc<dyn FrameSource>,
        engine: Box<dyn OcrEngine>,
        clock: FrameClock,
    ) -> Self {
        Self {
            segmenter: Arc::new(segmenter),
            frames,
            engine: Arc::new(SerialOcr::new(engine)),
            replacer: Arc::new(Replacer::default()),
            cache: RelativeValue::ZERO,
            format: RegionFormat::Png,
            concurrency: 1,
            clock,
        }
    }

    pub fn with_replacer(mut self, replacer: Replacer) -> Self {
        self.replacer = Arc::new(replacer);
        self
    }

    /// Difference threshold, relative to the crop area; zero disables reuse.
    pub fn with_cache(mut self, cache: RelativeValue) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_region_format(mut self, format: RegionFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    pub async fn run(
        &self,
        begin: Duration,
        end: Duration,
    ) -> Result<Vec<SubtitleSegment>, PipelineError> {
        self.run_with_progress(begin, end, |_| {}).await
    }

    /// Runs every frame in `[begin, end)` and returns the merged segments once
    /// all dispatched tasks have drained.
    pub async fn run_with_progress<F>(
        &self,
        begin: Duration,
        end: Duration,
        on_record: F,
    ) -> Result<Vec<SubtitleSegment>, PipelineError>
    where
        F: FnMut(&FrameRecord),
    {
        if self.concurrency == 0 {
            return Err(PipelineError::Concurrency);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let context = Arc::new(TaskContext {
            segmenter: Arc::clone(&self.segmenter),
            frames: Arc::clone(&self.frames),
            engine: Arc::clone(&self.engine),
            replacer: Arc::clone(&self.replacer),
            cache: self.cache,
            format: self.format,
            permits: Arc::new(Semaphore::new(self.concurrency.min(Semaphore::MAX_PERMITS))),
            stop: stop_tx,
        });

        let (report_tx, report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let (dispatched_tx, dispatched_rx) = oneshot::channel();
        let scheduler = Scheduler::new(context, self.concurrency, stop_rx);
        let keys = self.clock.keys(begin, end);
        tokio::spawn(async move {
            let dispatched = scheduler.dispatch(keys, report_tx).await;
            let _ = dispatched_tx.send(dispatched);
        });

        let sorter = FrameSorter::new(self.clock, self.clock.first(begin), report_rx, dispatched_rx);
        merge_records(self.clock, sorter.into_stream(), on_record).await
    }
}
