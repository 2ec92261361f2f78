//! Sanity checks on API payloads
//!
//! The vendor API intermittently answers with empty or partial payloads.

use std::collections::BTreeMap;

use crate::errors::RefreshError;
use crate::powervault::{Field, Reading, Series};

/// Key every usable series must carry in its first row.
pub const SENTINEL: Field = Field::InstantSoc;

/// Rejects a series that is empty or whose first row lacks [`SENTINEL`].
pub fn validate(series: Series, label: &str) -> Result<Series, RefreshError> {
    match series.first() {
        None => Err(RefreshError::DataIncomplete(format!(
            "{} series is empty",
            label
        ))),
        Some(first) if !first.contains(SENTINEL) => Err(RefreshError::DataIncomplete(format!(
            "{} series is missing `{}`",
            label, SENTINEL
        ))),
        Some(_) => Ok(series),
    }
}

/// Extracts the given fields, failing if any of them is absent or null.
pub fn require_fields(
    reading: &Reading,
    fields: &[Field],
) -> Result<BTreeMap<Field, f64>, RefreshError> {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();
    for &field in fields {
        match reading.get(field) {
            Some(value) => {
                values.insert(field, value);
            }
            None => missing.push(field.key()),
        }
    }
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(RefreshError::DataIncomplete(format!(
            "no value for {}",
            missing.join(", ")
        )))
    }
}
