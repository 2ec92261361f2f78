//! Data types for Powervault API responses

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PowervaultError;

/// Reading keys the bridge understands, named as in the API payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    InstantSoc,
    BatteryInputFromGrid,
    BatteryInputFromSolar,
    BatteryOutputConsumedByHome,
    BatteryOutputExported,
    HomeConsumed,
    GridConsumedByHome,
    SolarConsumedByHome,
    SolarExported,
    InstantBattery,
    InstantDemand,
    InstantGrid,
    SolarGenerated,
    SolarConsumption,
    InstantSolar,
}

impl Field {
    /// Power flows published as instantaneous gauges (W).
    pub const POWER: [Field; 14] = [
        Field::BatteryInputFromGrid,
        Field::BatteryInputFromSolar,
        Field::BatteryOutputConsumedByHome,
        Field::BatteryOutputExported,
        Field::HomeConsumed,
        Field::GridConsumedByHome,
        Field::SolarConsumedByHome,
        Field::SolarExported,
        Field::InstantBattery,
        Field::InstantDemand,
        Field::InstantGrid,
        Field::SolarGenerated,
        Field::SolarConsumption,
        Field::InstantSolar,
    ];

    /// Flows integrated into daily energy totals (kWh).
    pub const TOTALS: [Field; 9] = [
        Field::BatteryInputFromGrid,
        Field::BatteryInputFromSolar,
        Field::BatteryOutputConsumedByHome,
        Field::BatteryOutputExported,
        Field::HomeConsumed,
        Field::GridConsumedByHome,
        Field::SolarConsumedByHome,
        Field::SolarExported,
        Field::SolarGenerated,
    ];

    /// JSON key in the API payload
    pub const fn key(self) -> &'static str {
        match self {
            Field::InstantSoc => "instant_soc",
            Field::BatteryInputFromGrid => "batteryInputFromGrid",
            Field::BatteryInputFromSolar => "batteryInputFromSolar",
            Field::BatteryOutputConsumedByHome => "batteryOutputConsumedByHome",
            Field::BatteryOutputExported => "batteryOutputExported",
            Field::HomeConsumed => "homeConsumed",
            Field::GridConsumedByHome => "gridConsumedByHome",
            Field::SolarConsumedByHome => "solarConsumedByHome",
            Field::SolarExported => "solarExported",
            Field::InstantBattery => "instant_battery",
            Field::InstantDemand => "instant_demand",
            Field::InstantGrid => "instant_grid",
            Field::SolarGenerated => "solarGenerated",
            Field::SolarConsumption => "solarConsumption",
            Field::InstantSolar => "instant_solar",
        }
    }

    /// Human readable title, as shown in Home Assistant
    pub const fn title(self) -> &'static str {
        match self {
            Field::InstantSoc => "Charge",
            Field::BatteryInputFromGrid => "Battery Input From Grid",
            Field::BatteryInputFromSolar => "Battery Input From Solar",
            Field::BatteryOutputConsumedByHome => "Battery Output Consumed By Home",
            Field::BatteryOutputExported => "Battery Output Exported",
            Field::HomeConsumed => "Home Consumed",
            Field::GridConsumedByHome => "Grid Consumed By Home",
            Field::SolarConsumedByHome => "Solar Consumed By Home",
            Field::SolarExported => "Solar Exported",
            Field::InstantBattery => "Instant Battery",
            Field::InstantDemand => "Instant Demand",
            Field::InstantGrid => "Instant Grid",
            Field::SolarGenerated => "Solar Generated",
            Field::SolarConsumption => "Solar Consumption",
            Field::InstantSolar => "Instant Solar",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One point-in-time measurement
///
/// Keys present with a `null` value are kept as `None`; that is what
/// gap-filling looks for. Non-numeric values are dropped on parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct Reading {
    pub time: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, Option<f64>>,
}

/// Readings in API order
pub type Series = Vec<Reading>;

const TIME_KEY: &str = "time";

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if raw.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

impl From<BTreeMap<String, Value>> for Reading {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let mut reading = Reading::default();
        for (key, value) in raw {
            if key == TIME_KEY {
                reading.time = parse_time(&value);
                continue;
            }
            match value {
                Value::Number(n) => {
                    reading.values.insert(key, n.as_f64());
                }
                Value::Null => {
                    reading.values.insert(key, None);
                }
                _ => {}
            }
        }
        reading
    }
}

impl Reading {
    /// Builds a reading from known fields, `None` meaning an explicit null.
    pub fn from_fields<I>(time: Option<DateTime<Utc>>, fields: I) -> Self
    where
        I: IntoIterator<Item = (Field, Option<f64>)>,
    {
        Self {
            time,
            values: fields
                .into_iter()
                .map(|(field, value)| (field.key().to_string(), value))
                .collect(),
        }
    }

    /// Value of a field; `None` when the key is absent or null.
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(field.key()).copied().flatten()
    }

    /// Whether the key is present at all, null or not.
    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(field.key())
    }
}

/// Static unit metadata, fetched once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "epromId", default)]
    pub eprom_id: String,
}

/// Which time window a data query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Latest sample only
    Latest,
    PastHour,
    Today,
}

impl Period {
    /// Value of the `period` query parameter, if any
    pub const fn as_query(self) -> Option<&'static str> {
        match self {
            Period::Latest => None,
            Period::PastHour => Some("past-hour"),
            Period::Today => Some("today"),
        }
    }
}

/// Battery operating modes accepted by the state override endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatteryMode {
    Normal,
    OnlyCharge,
    OnlyDischarge,
    ForceCharge,
    ForceDischarge,
    Disable,
    Dormant,
}

impl BatteryMode {
    pub const ALL: [BatteryMode; 7] = [
        BatteryMode::Normal,
        BatteryMode::OnlyCharge,
        BatteryMode::OnlyDischarge,
        BatteryMode::ForceCharge,
        BatteryMode::ForceDischarge,
        BatteryMode::Disable,
        BatteryMode::Dormant,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            BatteryMode::Normal => "normal",
            BatteryMode::OnlyCharge => "only-charge",
            BatteryMode::OnlyDischarge => "only-discharge",
            BatteryMode::ForceCharge => "force-charge",
            BatteryMode::ForceDischarge => "force-discharge",
            BatteryMode::Disable => "disable",
            BatteryMode::Dormant => "dormant",
        }
    }
}

impl fmt::Display for BatteryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryMode {
    type Err = PowervaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| PowervaultError::InvalidMode(s.to_string()))
    }
}
