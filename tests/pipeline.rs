use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use image::{Rgb, RgbImage};
use subtitle_extract::{FrameRecord, OcrPipeline, PipelineError, SubtitleSegment, TaskStatus};
use subtitle_extract_frames::{FrameError, FrameResult, FrameSource, MemoryFrames};
use subtitle_extract_ocr::{OcrEngine, OcrError, OcrRequest, OcrResponse};
use subtitle_extract_segment::{RegionFormat, Segmenter, SegmenterConfig};
use subtitle_extract_types::{ColorGroup, FrameClock, FrameKey, RelativeValue};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 4;

fn clock() -> FrameClock {
    FrameClock::new(2, 1, Duration::from_secs(1)).unwrap()
}

fn keys(count: usize) -> Vec<FrameKey> {
    clock()
        .keys(Duration::ZERO, Duration::from_secs(3600))
        .take(count)
        .collect()
}

/// Black frame with a white bar of `bar` pixels on row 1.
fn frame(bar: u32) -> RgbImage {
    let mut image = RgbImage::new(WIDTH, HEIGHT);
    for x in 1..=bar {
        image.put_pixel(x, 1, Rgb([255, 255, 255]));
    }
    image
}

fn segmenter() -> Segmenter {
    Segmenter::new(SegmenterConfig {
        text_colors: vec![ColorGroup::exact(255, 255, 255)],
        ..SegmenterConfig::default()
    })
}

fn frames_with_bars(bars: &[u32]) -> MemoryFrames {
    keys(bars.len())
        .into_iter()
        .zip(bars.iter().copied())
        .map(|(key, bar)| (key, frame(bar)))
        .collect()
}

/// Bars per frame: 0 is empty, then 3, 3, 5, empty, 3. Nothing after.
fn frames() -> MemoryFrames {
    frames_with_bars(&[0, 3, 3, 5, 0, 3])
}

/// Blocks callers until released. Waiting gives up after a few seconds so a
/// failed test cannot hang the runtime.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    fn released() -> Self {
        Self {
            open: Mutex::new(true),
            opened: Condvar::new(),
        }
    }

    fn wait(&self) {
        let open = self.open.lock().unwrap();
        let _ = self
            .opened
            .wait_timeout_while(open, Duration::from_secs(5), |open| !*open)
            .unwrap();
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// Reads the region width back out of the encoded image.
#[derive(Default)]
struct WidthEngine {
    calls: Arc<AtomicUsize>,
}

impl OcrEngine for WidthEngine {
    fn name(&self) -> &'static str {
        "width"
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let image = image::load_from_memory(request.image())
            .map_err(|err| OcrError::backend(err.to_string()))?;
        Ok(OcrResponse::new(format!("w{}", image.width())))
    }
}

struct FailingEngine;

impl OcrEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Err(OcrError::backend("engine unavailable"))
    }
}

/// Wraps a source, holding every load at a gate and counting overlap.
struct GatedFrames {
    inner: MemoryFrames,
    gate: Arc<Gate>,
    loads: AtomicUsize,
    inside: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedFrames {
    fn new(inner: MemoryFrames, gate: Arc<Gate>) -> Self {
        Self {
            inner,
            gate,
            loads: AtomicUsize::new(0),
            inside: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl FrameSource for GatedFrames {
    fn load(&self, key: FrameKey) -> FrameResult<Option<RgbImage>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.gate.wait();
        self.inside.fetch_sub(1, Ordering::SeqCst);
        self.inner.load(key)
    }
}

/// Like `WidthEngine`, but every call waits at a gate first.
struct GatedEngine {
    gate: Arc<Gate>,
    calls: Arc<AtomicUsize>,
}

impl OcrEngine for GatedEngine {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        let image = image::load_from_memory(request.image())
            .map_err(|err| OcrError::backend(err.to_string()))?;
        Ok(OcrResponse::new(format!("w{}", image.width())))
    }
}

struct BrokenFrame {
    inner: MemoryFrames,
    broken: FrameKey,
}

impl FrameSource for BrokenFrame {
    fn load(&self, key: FrameKey) -> FrameResult<Option<RgbImage>> {
        if key == self.broken {
            return Err(FrameError::Format {
                value: "corrupt".into(),
            });
        }
        self.inner.load(key)
    }
}

fn pipeline(frames: Arc<dyn FrameSource>, engine: Box<dyn OcrEngine>) -> OcrPipeline {
    OcrPipeline::new(segmenter(), frames, engine, clock()).with_region_format(RegionFormat::Png)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn segments_follow_frame_order_and_stop_at_missing_frame() {
    let engine = WidthEngine::default();
    let calls = Arc::clone(&engine.calls);
    let records = Mutex::new(Vec::<FrameRecord>::new());

    let segments = pipeline(Arc::new(frames()), Box::new(engine))
        .with_concurrency(3)
        .run_with_progress(Duration::ZERO, Duration::from_secs(3600), |record| {
            records.lock().unwrap().push(record.clone());
        })
        .await
        .unwrap();

    let k = keys(7);
    assert_eq!(
        segments,
        vec![
            SubtitleSegment::new(k[1], k[3], "w3"),
            SubtitleSegment::new(k[3], k[4], "w5"),
            SubtitleSegment::new(k[5], k[6], "w3"),
        ]
    );

    let records = records.into_inner().unwrap();
    let seen: Vec<_> = records.iter().map(|record| record.key).collect();
    assert_eq!(seen, k[..6].to_vec());
    let statuses: Vec<_> = records.iter().map(|record| record.status).collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Empty,
            TaskStatus::Recognized,
            TaskStatus::Recognized,
            TaskStatus::Recognized,
            TaskStatus::Empty,
            TaskStatus::Recognized,
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identical_regions_reuse_previous_text() {
    let engine = WidthEngine::default();
    let calls = Arc::clone(&engine.calls);
    let records = Mutex::new(Vec::<FrameRecord>::new());

    let segments = pipeline(Arc::new(frames()), Box::new(engine))
        .with_concurrency(2)
        .with_cache(RelativeValue::new(0.01, 0))
        .run_with_progress(Duration::ZERO, Duration::from_secs(3600), |record| {
            records.lock().unwrap().push(record.clone());
        })
        .await
        .unwrap();

    let records = records.into_inner().unwrap();
    assert_eq!(records[2].status, TaskStatus::Cached);
    assert_eq!(records[2].text, "w3");
    // the frame after an empty one has no region to compare against
    assert_eq!(records[5].status, TaskStatus::Recognized);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let k = keys(7);
    assert_eq!(segments[0], SubtitleSegment::new(k[1], k[2], "w3"));
    assert_eq!(segments[1], SubtitleSegment::new(k[2], k[3], "w3"));
    assert_eq!(segments.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_tasks_never_exceed_concurrency() {
    let gate = Arc::new(Gate::default());
    let frames = Arc::new(GatedFrames::new(
        frames_with_bars(&[3, 5, 3, 5, 3]),
        Arc::clone(&gate),
    ));
    let records = Mutex::new(Vec::<FrameRecord>::new());

    let stage = pipeline(frames.clone(), Box::new(WidthEngine::default())).with_concurrency(2);
    let run = stage
        .run_with_progress(Duration::ZERO, Duration::from_millis(2500), |record| {
            records.lock().unwrap().push(record.clone());
        });
    let control = async {
        eventually("two loads in flight", || {
            frames.inside.load(Ordering::SeqCst) == 2
        })
        .await;
        // nothing else gets in while both permits are taken
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(frames.inside.load(Ordering::SeqCst), 2);
        assert_eq!(frames.loads.load(Ordering::SeqCst), 2);
        gate.release();
    };
    let (segments, ()) = tokio::join!(run, control);

    assert_eq!(segments.unwrap().len(), 5);
    assert_eq!(frames.peak.load(Ordering::SeqCst), 2);
    let seen: Vec<_> = records
        .into_inner()
        .unwrap()
        .iter()
        .map(|record| record.key)
        .collect();
    assert_eq!(seen, keys(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_waiting_on_a_handoff_do_not_hold_a_permit() {
    let frames = Arc::new(GatedFrames::new(
        frames_with_bars(&[3, 5, 3, 5, 3]),
        Arc::new(Gate::released()),
    ));
    let gate = Arc::new(Gate::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = GatedEngine {
        gate: Arc::clone(&gate),
        calls: Arc::clone(&calls),
    };

    let stage = pipeline(frames.clone(), Box::new(engine)).with_concurrency(2);
    let run = stage
        .run(Duration::ZERO, Duration::from_millis(2500));
    let control = async {
        // the first frame is stuck in recognition and the second waits on
        // it, yet the rest still get segmented
        eventually("every frame loaded", || {
            frames.loads.load(Ordering::SeqCst) == 5
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        gate.release();
    };
    let (segments, ()) = tokio::join!(run, control);

    assert_eq!(segments.unwrap().len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn end_bound_limits_the_range() {
    let segments = pipeline(Arc::new(frames()), Box::new(WidthEngine::default()))
        .with_concurrency(2)
        .run(Duration::ZERO, Duration::from_secs(2))
        .await
        .unwrap();

    let k = keys(4);
    assert_eq!(segments, vec![
        SubtitleSegment::new(k[1], k[3], "w3"),
        SubtitleSegment::new(k[3], FrameKey::new(Duration::from_secs(2), 0), "w5"),
    ]);
}

#[tokio::test]
async fn engine_failures_only_blank_the_text() {
    let segments = pipeline(Arc::new(frames()), Box::new(FailingEngine))
        .with_concurrency(2)
        .run(Duration::ZERO, Duration::from_secs(3600))
        .await
        .unwrap();
    assert!(segments.is_empty());
}

#[tokio::test]
async fn frame_errors_fail_the_run() {
    let broken = keys(3)[2];
    let frames = BrokenFrame {
        inner: frames(),
        broken,
    };
    let err = pipeline(Arc::new(frames), Box::new(WidthEngine::default()))
        .with_concurrency(2)
        .run(Duration::ZERO, Duration::from_secs(3600))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Frame { key, .. } if key == broken));
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let err = pipeline(Arc::new(frames()), Box::new(WidthEngine::default()))
        .with_concurrency(0)
        .run(Duration::ZERO, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Concurrency));
}
