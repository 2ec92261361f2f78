//! Immutable result of one refresh cycle

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::aggregate::Totals;
use super::validate::require_fields;
use crate::errors::RefreshError;
use crate::powervault::{Field, Reading};

/// Raw instant solar readings above this are sensor glitches.
pub const INSTANT_SOLAR_LIMIT: f64 = 10_000.0;

/// Everything published after a successful refresh
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub time: Option<DateTime<Utc>>,
    values: BTreeMap<Field, f64>,
    pub totals: Totals,
    pub mode: String,
}

impl Snapshot {
    /// Combines a gap-filled reading, today's totals and the battery mode.
    ///
    /// Fails when the charge or any power flow is still absent or null.
    pub fn assemble(current: &Reading, totals: Totals, mode: String) -> Result<Self, RefreshError> {
        let required: Vec<Field> = std::iter::once(Field::InstantSoc)
            .chain(Field::POWER)
            .collect();
        let mut values = require_fields(current, &required)?;

        if let Some(solar) = values.get_mut(&Field::InstantSolar) {
            if *solar > INSTANT_SOLAR_LIMIT {
                *solar = 0.0;
            }
        }

        Ok(Self {
            time: current.time,
            values,
            totals,
            mode,
        })
    }

    /// Charge, percent
    pub fn charge(&self) -> f64 {
        self.get(Field::InstantSoc).unwrap_or_default()
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Same snapshot with another battery mode, for optimistic updates.
    pub fn with_mode(&self, mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..self.clone()
        }
    }
}
