use std::sync::Arc;
use std::time::{Duration, Instant};

use subtitle_extract_frames::{FrameError, FrameSource};
use subtitle_extract_ocr::{OcrEngine, OcrRequest, Replacer};
use subtitle_extract_segment::{BinaryImage, RegionFormat, Segmenter, difference, encode_region};
use subtitle_extract_types::{FrameKey, RelativeValue};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot, watch};
use tokio::task::spawn_blocking;

use super::{FrameRecord, PipelineError, TaskStatus};

/// Shared, read-only state every task runs against.
pub(crate) struct TaskContext {
    pub segmenter: Arc<Segmenter>,
    pub frames: Arc<dyn FrameSource>,
    pub engine: Arc<dyn OcrEngine>,
    pub replacer: Arc<Replacer>,
    pub cache: RelativeValue,
    pub format: RegionFormat,
    /// Bounds how many tasks segment or recognize at once.
    pub permits: Arc<Semaphore>,
    pub stop: watch::Sender<bool>,
}

impl TaskContext {
    pub fn request_stop(&self) {
        self.stop.send_replace(true);
    }
}

/// What a task passes to its successor: its trimmed region and final text.
#[derive(Debug, Clone, Default)]
pub(crate) struct Handoff {
    pub region: Option<Arc<BinaryImage>>,
    pub text: String,
}

#[derive(Debug)]
pub(crate) enum TaskReport {
    Done(FrameRecord),
    /// The frame does not exist; no frame at or after this key is expected.
    Ended(FrameKey),
    Failed(PipelineError),
}

struct Segmented {
    crop_area: i64,
    region: Option<BinaryImage>,
}

pub(crate) struct PipelineTask {
    pub key: FrameKey,
    pub prev: oneshot::Receiver<Handoff>,
    pub next: oneshot::Sender<Handoff>,
    pub permit: OwnedSemaphorePermit,
    /// Time already spent waiting for the permit.
    pub idle: Duration,
}

impl PipelineTask {
    pub async fn run(self, context: Arc<TaskContext>) -> TaskReport {
        let PipelineTask {
            key,
            prev,
            next,
            permit,
            mut idle,
        } = self;

        let segmented = match segment_frame(&context, key).await {
            Ok(Some(segmented)) => segmented,
            Ok(None) => {
                log::info!("frame {key} does not exist, stopping");
                context.request_stop();
                drop(next);
                drop(permit);
                return TaskReport::Ended(key);
            }
            Err(err) => {
                context.request_stop();
                drop(next);
                drop(permit);
                return TaskReport::Failed(err);
            }
        };

        let Some(region) = segmented.region else {
            let _ = next.send(Handoff::default());
            drop(permit);
            return finish(key, TaskStatus::Empty, String::new(), idle);
        };
        let region = Arc::new(region);

        // The permit is not held across the handoff wait; the predecessor
        // may itself need one to finish.
        drop(permit);
        let waiting = Instant::now();
        // A closed link means the predecessor ended without a region.
        let previous = prev.await.unwrap_or_default();
        let permit = match Arc::clone(&context.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                drop(next);
                return TaskReport::Failed(PipelineError::Invariant {
                    message: format!("permits closed while frame {key} was waiting"),
                });
            }
        };
        idle += waiting.elapsed();

        let (status, text) = if reuses_previous(
            &context.cache,
            segmented.crop_area,
            previous.region.as_deref(),
            &region,
        ) {
            (TaskStatus::Cached, previous.text)
        } else {
            let text = match recognize(&context, key, Arc::clone(&region)).await {
                Ok(text) => text,
                Err(err) => {
                    context.request_stop();
                    drop(next);
                    drop(permit);
                    return TaskReport::Failed(err);
                }
            };
            (TaskStatus::Recognized, text)
        };

        let _ = next.send(Handoff {
            region: Some(region),
            text: text.clone(),
        });
        drop(permit);
        finish(key, status, text, idle)
    }
}

fn finish(key: FrameKey, status: TaskStatus, text: String, idle: Duration) -> TaskReport {
    log::debug!("{key} ({status}) idle={:3}ms {text:?}", idle.as_millis());
    TaskReport::Done(FrameRecord {
        key,
        status,
        text,
        idle,
    })
}

fn reuses_previous(
    cache: &RelativeValue,
    crop_area: i64,
    previous: Option<&BinaryImage>,
    current: &BinaryImage,
) -> bool {
    if cache.is_zero() {
        return false;
    }
    let Ok(limit) = u64::try_from(cache.calculate(crop_area)) else {
        return false;
    };
    difference(previous, Some(current)) <= limit
}

async fn segment_frame(
    context: &Arc<TaskContext>,
    key: FrameKey,
) -> Result<Option<Segmented>, PipelineError> {
    let context = Arc::clone(context);
    let loaded = spawn_blocking(move || -> Result<Option<Segmented>, FrameError> {
        let Some(image) = context.frames.load(key)? else {
            return Ok(None);
        };
        let segmentation = context.segmenter.segment(&image);
        Ok(Some(Segmented {
            crop_area: segmentation.crop.area(),
            region: segmentation.region,
        }))
    })
    .await
    .map_err(|err| PipelineError::Task {
        key,
        message: err.to_string(),
    })?;
    loaded.map_err(|source| PipelineError::Frame { key, source })
}

/// Encodes the region and runs the engine. Encode and engine failures only
/// cost this frame its text.
async fn recognize(
    context: &Arc<TaskContext>,
    key: FrameKey,
    region: Arc<BinaryImage>,
) -> Result<String, PipelineError> {
    let context = Arc::clone(context);
    spawn_blocking(move || {
        let bytes = match encode_region(&region, context.format) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("failed to encode region of frame {key}: {err}");
                Vec::new()
            }
        };
        match context.engine.recognize(&OcrRequest::new(&bytes)) {
            Ok(response) => context.replacer.apply(&response.text),
            Err(err) => {
                log::warn!("failed to get text from frame {key}: {err}");
                String::new()
            }
        }
    })
    .await
    .map_err(|err| PipelineError::Task {
        key,
        message: err.to_string(),
    })
}
