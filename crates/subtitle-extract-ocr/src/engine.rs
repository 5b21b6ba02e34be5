use std::sync::{Mutex, PoisonError};

use crate::error::OcrError;
use crate::request::OcrRequest;
use crate::response::OcrResponse;

/// Common interface for all OCR engines.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn warm_up(&self) -> Result<(), OcrError> {
        Ok(())
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError>;
}

/// Engine that never finds any text.
#[derive(Debug, Default)]
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(OcrResponse::empty())
    }
}

/// Wraps an engine so that at most one `recognize` call runs at a time.
///
/// Segmentation work around the call stays parallel; only the engine itself
/// is entered under the lock.
pub struct SerialOcr<E: ?Sized> {
    lock: Mutex<()>,
    engine: Box<E>,
}

impl<E: OcrEngine + ?Sized> SerialOcr<E> {
    pub fn new(engine: Box<E>) -> Self {
        Self {
            lock: Mutex::new(()),
            engine,
        }
    }

    pub fn inner(&self) -> &E {
        &self.engine
    }
}

impl<E: OcrEngine + ?Sized> OcrEngine for SerialOcr<E> {
    fn name(&self) -> &'static str {
        self.engine.name()
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.engine.warm_up()
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.engine.recognize(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct OverlapProbe {
        inside: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl OcrEngine for OverlapProbe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.inside.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(OcrResponse::new(format!("{} bytes", request.image().len())))
        }
    }

    #[test]
    fn noop_engine_returns_empty_text() {
        let engine = NoopOcrEngine;
        let response = engine.recognize(&OcrRequest::new(&[1, 2, 3])).unwrap();
        assert!(response.text.is_empty());
        assert_eq!(engine.name(), "noop");
    }

    #[test]
    fn serial_wrapper_never_overlaps_calls() {
        let serial = Arc::new(SerialOcr::new(Box::new(OverlapProbe::default())));
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let serial = Arc::clone(&serial);
                thread::spawn(move || {
                    let bytes = vec![0u8; index + 1];
                    serial.recognize(&OcrRequest::new(&bytes)).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(serial.inner().calls.load(Ordering::SeqCst), 8);
        assert_eq!(serial.inner().peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn serial_wrapper_accepts_trait_objects() {
        let engine: Box<dyn OcrEngine> = Box::new(NoopOcrEngine);
        let serial = SerialOcr::new(engine);
        assert_eq!(serial.name(), "noop");
        assert!(serial.warm_up().is_ok());
    }
}
