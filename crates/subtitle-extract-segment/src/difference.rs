use subtitle_extract_types::Coordinate;

use crate::binary::{BLACK, BinaryImage};

/// Distance reported when either side has no region.
pub const UNBOUNDED_DIFFERENCE: u64 = u64::MAX;

/// Counts disagreeing pixels over the union of both bounds.
///
/// A pixel covered by only one image counts iff it is BLACK there.
pub fn difference(a: Option<&BinaryImage>, b: Option<&BinaryImage>) -> u64 {
    let (Some(a), Some(b)) = (a, b) else {
        return UNBOUNDED_DIFFERENCE;
    };
    let union = a.bounds().union(&b.bounds());
    let mut total = 0u64;
    for y in union.min_y..union.max_y {
        for x in union.min_x..union.max_x {
            let point = Coordinate::new(x, y);
            let differs = match (a.get(point), b.get(point)) {
                (Some(left), Some(right)) => left != right,
                (Some(value), None) | (None, Some(value)) => value == BLACK,
                (None, None) => false,
            };
            total += u64::from(differs);
        }
    }
    total
}
