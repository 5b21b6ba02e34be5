use std::path::PathBuf;

use subtitle_extract_frames::FrameError;
use subtitle_extract_ocr::OcrError;
use thiserror::Error;

use crate::settings::ConfigError;
use crate::stage::PipelineError;
use crate::subtitle::SubtitleError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Subtitle(#[from] SubtitleError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("OCR engine failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("failed to process image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0}")]
    Unsupported(String),
}
