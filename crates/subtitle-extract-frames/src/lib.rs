//! Frame storage: the sliced directory layout, frame sources used by the
//! recognition pipeline, and the ffmpeg driver that produces the frames.

mod error;
mod layout;
mod slicer;
mod source;

pub use error::{FrameError, FrameResult};
pub use layout::{FrameFormat, FrameLayout};
pub use slicer::{FrameRenamer, SliceJob, SliceSummary, Slicer};
pub use source::{DirectoryFrames, FrameSource, MemoryFrames};
