use serde::{Deserialize, Serialize};

use crate::RelativeValue;

/// One textual substitution applied to recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRule {
    #[serde(default)]
    pub regexp: bool,
    pub from: String,
    pub to: String,
}

impl ReplaceRule {
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            regexp: false,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn pattern(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            regexp: true,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Levenshtein distance over Unicode scalar values with unit costs.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let rows = a.len() + 1;
    let cols = b.len() + 1;
    let mut table = vec![0usize; rows * cols];
    for i in 0..rows {
        table[i * cols] = i;
    }
    for j in 0..cols {
        table[j] = j;
    }
    for i in 1..rows {
        for j in 1..cols {
            let substitution = usize::from(a[i - 1] != b[j - 1]);
            let diagonal = table[(i - 1) * cols + (j - 1)] + substitution;
            let up = table[(i - 1) * cols + j] + 1;
            let left = table[i * cols + (j - 1)] + 1;
            table[i * cols + j] = diagonal.min(up).min(left);
        }
    }
    table[rows * cols - 1]
}

/// Exact equality for a zero threshold, otherwise an edit-distance budget
/// evaluated against the character count of `a`.
pub fn similar(a: &str, b: &str, threshold: &RelativeValue) -> bool {
    if threshold.is_zero() {
        return a == b;
    }
    let budget = threshold.calculate(a.chars().count() as i64);
    match u64::try_from(budget) {
        Ok(budget) => edit_distance(a, b) as u64 <= budget,
        Err(_) => false,
    }
}
