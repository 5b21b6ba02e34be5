use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Target colour plus a per-channel tolerance, written `#rrggbb` or `#rrggbb/N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorGroup {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub tolerance: i64,
}

impl ColorGroup {
    pub const fn new(r: u8, g: u8, b: u8, tolerance: i64) -> Self {
        Self { r, g, b, tolerance }
    }

    pub const fn exact(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0)
    }

    /// Holds iff the summed channel distance is within three tolerances.
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        let distance = i64::from(self.r.abs_diff(rgb[0]))
            + i64::from(self.g.abs_diff(rgb[1]))
            + i64::from(self.b.abs_diff(rgb[2]));
        distance <= self.tolerance.saturating_mul(3)
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn any_contains(groups: &[ColorGroup], rgb: [u8; 3]) -> bool {
        groups.iter().any(|group| group.contains(rgb))
    }
}

impl FromStr for ColorGroup {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .ok_or_else(|| TypesError::color(s, "missing leading '#'"))?;
        let (hex, tolerance) = match hex.split_once('/') {
            Some((hex, tolerance)) => {
                let tolerance = tolerance
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| TypesError::color(s, "tolerance is not an integer"))?;
                (hex, tolerance)
            }
            None => (hex, 0),
        };
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(TypesError::color(s, "expected six hex digits"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| TypesError::color(s, "invalid hex digit"))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            tolerance,
        })
    }
}

impl TryFrom<String> for ColorGroup {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorGroup> for String {
    fn from(value: ColorGroup) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.tolerance != 0 {
            write!(f, "/{}", self.tolerance)?;
        }
        Ok(())
    }
}
