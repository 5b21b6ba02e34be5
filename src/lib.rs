//! Burned-in subtitle extraction: frame slicing, per-frame segmentation and
//! OCR, and reassembly of the recognized text into timed subtitles.

pub mod check;
pub mod cli;
pub mod commands;
pub mod error;
pub mod progress;
pub mod settings;
pub mod stage;
pub mod subtitle;

pub use error::AppError;
pub use stage::{FrameRecord, OcrPipeline, PipelineError, TaskStatus};
pub use subtitle::{SubtitleFormat, SubtitleSegment};
