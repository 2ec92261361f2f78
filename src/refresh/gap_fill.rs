//! Backfilling of null fields from recent history

use crate::powervault::Reading;

/// Whether any present field of the reading is null.
pub fn has_gaps(reading: &Reading) -> bool {
    reading.values.values().any(Option::is_none)
}

/// Replaces every null field with its most recent non-null value in `history`.
///
/// `history` is scanned from its last entry backward. Fields with no known
/// value stay null; the timestamp is never touched.
pub fn fill_gaps(current: &Reading, history: &[Reading]) -> Reading {
    let mut filled = current.clone();
    for (key, value) in filled.values.iter_mut() {
        if value.is_some() {
            continue;
        }
        *value = history
            .iter()
            .rev()
            .find_map(|row| row.values.get(key).copied().flatten());
    }
    filled
}
