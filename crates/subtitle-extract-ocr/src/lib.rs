//! Text recognition seam: the engine trait, the serializing wrapper that
//! guards a non-reentrant engine, and the post-recognition text rules.

mod backends;
mod engine;
mod error;
mod replace;
mod request;
mod response;

#[cfg(feature = "engine-tesseract")]
pub use backends::tesseract::{TesseractCliEngine, TesseractOptions};
pub use engine::{NoopOcrEngine, OcrEngine, SerialOcr};
pub use error::OcrError;
pub use replace::Replacer;
pub use request::OcrRequest;
pub use response::OcrResponse;
