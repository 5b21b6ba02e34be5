//! Shared domain models for the subtitle-extract workspace.
//!
//! This crate centralizes the lightweight value types used across the
//! segmentation, OCR, frame and CLI crates: relative measurements, colour
//! groups, rectangles, frame keys and text similarity helpers. Keep it free
//! of image codecs and async runtimes so every crate can depend on it.

mod clock;
mod color;
mod geometry;
mod relative;
mod text;

pub use clock::{FrameClock, FrameKey, format_clock, parse_clock};
pub use color::ColorGroup;
pub use geometry::{Coordinate, Rect};
pub use relative::{Area, Margin, Range, RelativeValue};
pub use text::{ReplaceRule, edit_distance, similar};

use thiserror::Error;

pub type TypesResult<T> = Result<T, TypesError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("unable to parse '{input}' as relative value: {reason}")]
    RelativeValue { input: String, reason: String },

    #[error("unable to parse '{input}' as color group: {reason}")]
    ColorGroup { input: String, reason: String },

    #[error("unable to parse '{input}' as hh:mm:ss time")]
    Clock { input: String },

    #[error("invalid frame clock: {message}")]
    FrameClock { message: String },
}

impl TypesError {
    pub(crate) fn relative(input: &str, reason: impl Into<String>) -> Self {
        Self::RelativeValue {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn color(input: &str, reason: impl Into<String>) -> Self {
        Self::ColorGroup {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
