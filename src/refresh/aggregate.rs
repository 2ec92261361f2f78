//! Daily energy totals from 5-minute power samples

use std::collections::BTreeMap;

use crate::powervault::{Field, Reading};

/// Rows with this field absent or null are not live data.
pub const LIVENESS_FIELD: Field = Field::InstantBattery;

/// Hours covered by one sample of the "today" series.
const SAMPLE_HOURS: f64 = 5.0 / 60.0;

/// Rounds the exact binary value to `decimals` places, ties to even.
///
/// Scaling by a power of ten first would round twice: 0.0249999... becomes
/// 2.5 and then 3.
pub(crate) fn round(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Cumulative kWh per field for the current day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals(BTreeMap<Field, f64>);

impl Totals {
    pub fn get(&self, field: Field) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Field, f64)> for Totals {
    fn from_iter<I: IntoIterator<Item = (Field, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Integrates watt samples into kWh, one 5-minute slot per row.
///
/// The running sum is rounded to 2 decimals after every addition.
/// Fields without any contribution report `0.0`.
pub fn aggregate(series: &[Reading], fields: &[Field]) -> Totals {
    let live: Vec<&Reading> = series
        .iter()
        .filter(|row| row.get(LIVENESS_FIELD).is_some())
        .collect();

    fields
        .iter()
        .map(|&field| {
            let total = live
                .iter()
                .filter_map(|row| row.get(field))
                .fold(0.0, |sum, watts| {
                    round(sum + watts / 1000.0 * SAMPLE_HOURS, 2)
                });
            (field, total)
        })
        .collect()
}
