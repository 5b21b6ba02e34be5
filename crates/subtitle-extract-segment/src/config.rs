use subtitle_extract_types::{Area, ColorGroup, Margin, Range, RelativeValue};

use crate::error::SegmentError;

const EIGHT_NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    /// Neighbor offsets; four-connectivity drops the diagonals.
    pub fn offsets(&self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &EIGHT_NEIGHBORS[..4],
            Connectivity::Eight => &EIGHT_NEIGHBORS,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

impl TryFrom<u32> for Connectivity {
    type Error = SegmentError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(SegmentError::Connectivity { value: other }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeExclusion {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderConfig {
    pub colors: Vec<ColorGroup>,
    /// Minimum matched border pixels, relative to the blob's total border.
    pub level: RelativeValue,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            level: RelativeValue::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub connectivity: Connectivity,
    /// Blob pixel count, relative to the cropped area.
    pub size: Range,
    pub width: Range,
    pub height: Range,
    pub border: BorderConfig,
    pub no_on_edge: EdgeExclusion,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            size: Range::unbounded(),
            width: Range::unbounded(),
            height: Range::unbounded(),
            border: BorderConfig::default(),
            no_on_edge: EdgeExclusion::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmenterConfig {
    pub crop: Area,
    pub text_colors: Vec<ColorGroup>,
    pub optimizer: OptimizerConfig,
    pub margin: Margin,
}
