use std::path::PathBuf;
use std::process::ExitStatus;

use subtitle_extract_types::TypesError;
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ffmpeg exited with {status}:\n{stderr}")]
    Ffmpeg { status: ExitStatus, stderr: String },
    #[error("unsupported frame format '{value}' (expected jpg or png)")]
    Format { value: String },
    #[error(transparent)]
    Types(#[from] TypesError),
}

impl FrameError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
