//! Segmentation engine: isolates likely subtitle pixels in one frame.
//!
//! The stages run in a fixed order: crop, binarize, optimize (connected
//! component filtering) and trim. Each stage returns a fresh [`BinaryImage`]
//! together with the list of its BLACK coordinates.

mod binary;
mod config;
mod difference;
mod encode;
mod engine;
mod error;
mod scratch;

pub use binary::{BLACK, BinaryImage, FrameView, WHITE};
pub use config::{BorderConfig, Connectivity, EdgeExclusion, OptimizerConfig, SegmenterConfig};
pub use difference::{UNBOUNDED_DIFFERENCE, difference};
pub use encode::{RegionFormat, encode_region};
pub use engine::{Segmentation, Segmenter};
pub use error::SegmentError;
