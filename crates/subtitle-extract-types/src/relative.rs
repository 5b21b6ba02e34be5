use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// A measurement of the form `ratio * base + offset`.
///
/// The textual form is `"<percent>%<signed offset>"`, e.g. `"12.5%+3"` or
/// `"0%-2"`. The percentage is divided by 100 while parsing, so `ratio` is
/// always a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativeValue {
    pub ratio: f64,
    pub offset: i64,
}

impl RelativeValue {
    pub const ZERO: Self = Self {
        ratio: 0.0,
        offset: 0,
    };

    pub const FULL: Self = Self {
        ratio: 1.0,
        offset: 0,
    };

    pub fn new(ratio: f64, offset: i64) -> Self {
        Self { ratio, offset }
    }

    pub fn absolute(offset: i64) -> Self {
        Self { ratio: 0.0, offset }
    }

    /// Evaluates the value against `base`, truncating the scaled part toward
    /// zero. Results saturate at the `i64` bounds.
    pub fn calculate(&self, base: i64) -> i64 {
        ((base as f64 * self.ratio) as i64).saturating_add(self.offset)
    }

    pub fn is_zero(&self) -> bool {
        self.ratio == 0.0 && self.offset == 0
    }
}

impl FromStr for RelativeValue {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (percent, offset) = trimmed
            .split_once('%')
            .ok_or_else(|| TypesError::relative(s, "missing '%'"))?;
        let percent: f64 = percent
            .trim()
            .parse()
            .map_err(|_| TypesError::relative(s, "percentage is not a number"))?;
        if !percent.is_finite() {
            return Err(TypesError::relative(s, "percentage must be finite"));
        }
        let offset = offset.trim();
        let offset = if offset.is_empty() {
            0
        } else {
            offset
                .parse::<i64>()
                .map_err(|_| TypesError::relative(s, "offset is not an integer"))?
        };
        Ok(Self {
            ratio: percent / 100.0,
            offset,
        })
    }
}

impl TryFrom<String> for RelativeValue {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelativeValue> for String {
    fn from(value: RelativeValue) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RelativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{:+}", self.ratio * 100.0, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: RelativeValue,
    pub max: RelativeValue,
}

impl Range {
    pub fn new(min: RelativeValue, max: RelativeValue) -> Self {
        Self { min, max }
    }

    /// Accepts everything between zero and the full base.
    pub fn unbounded() -> Self {
        Self {
            min: RelativeValue::ZERO,
            max: RelativeValue::FULL,
        }
    }

    /// Evaluates both bounds against `base` and returns `(min, max)`.
    pub fn bounds(&self, base: i64) -> (i64, i64) {
        (self.min.calculate(base), self.max.calculate(base))
    }
}

/// Crop rectangle: `left`/`right` scale with width, `top`/`bottom` with height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub left: RelativeValue,
    pub right: RelativeValue,
    pub top: RelativeValue,
    pub bottom: RelativeValue,
}

impl Default for Area {
    fn default() -> Self {
        Self {
            left: RelativeValue::ZERO,
            right: RelativeValue::FULL,
            top: RelativeValue::ZERO,
            bottom: RelativeValue::FULL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margin {
    pub x: RelativeValue,
    pub y: RelativeValue,
}
