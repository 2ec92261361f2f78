//! Published entities and their Home Assistant discovery payloads

use serde::Serialize;

use crate::mqtt::context::MqttPayload;
use crate::powervault::{BatteryMode, Field, UnitInfo};
use crate::refresh::Snapshot;

pub const MANUFACTURER: &str = "Powervault";
pub const ONLINE_TOPIC: &str = "online";
pub const MODE_TOPIC: &str = "battery_mode";
pub const COMMAND_TOPIC: &str = "battery_mode/set";

/// One entity exposed to the automation platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Instantaneous value (charge or power flow)
    Gauge(Field),
    /// Energy accumulated since midnight
    Counter(Field),
    /// Settable battery mode
    Select,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryDevice<'a> {
    pub identifiers: Vec<&'a str>,
    pub manufacturer: &'static str,
    pub model: &'a str,
    pub name: &'a str,
    pub sw_version: &'a str,
}

/// Home Assistant MQTT discovery config
#[derive(Debug, Serialize)]
pub struct Discovery<'a> {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
    pub device: DiscoveryDevice<'a>,
}

/// Every entity the bridge publishes, in publishing order.
pub fn catalogue() -> Vec<Metric> {
    std::iter::once(Metric::Gauge(Field::InstantSoc))
        .chain(Field::POWER.map(Metric::Gauge))
        .chain(Field::TOTALS.map(Metric::Counter))
        .chain(std::iter::once(Metric::Select))
        .collect()
}

impl Metric {
    /// Home Assistant platform
    pub const fn component(self) -> &'static str {
        match self {
            Metric::Gauge(_) | Metric::Counter(_) => "sensor",
            Metric::Select => "select",
        }
    }

    /// State topic, relative to the unit root topic
    pub fn topic(self) -> String {
        match self {
            Metric::Gauge(field) => format!("status/{}", field.key()),
            Metric::Counter(field) => format!("totals/{}", field.key()),
            Metric::Select => MODE_TOPIC.to_string(),
        }
    }

    pub fn unique_id(self, unit_id: &str) -> String {
        match self {
            Metric::Gauge(Field::InstantSoc) => format!("{}_charge", unit_id),
            Metric::Gauge(field) => format!("{}_{}", unit_id, field.key()),
            Metric::Counter(field) => format!("{}_total{}", unit_id, field.key()),
            Metric::Select => format!("{}_charge_status", unit_id),
        }
    }

    pub fn name(self) -> String {
        match self {
            Metric::Gauge(field) => format!("{} {}", MANUFACTURER, field.title()),
            Metric::Counter(field) => format!("{} Total {}", MANUFACTURER, field.title()),
            Metric::Select => format!("{} Charge Status", MANUFACTURER),
        }
    }

    /// Payload for this metric, if the snapshot carries a value
    pub fn payload(self, snapshot: &Snapshot) -> Option<String> {
        match self {
            Metric::Gauge(Field::InstantSoc) => {
                Some((snapshot.charge().round() as i64).to_payload())
            }
            Metric::Gauge(field) => snapshot.get(field).map(|v| v.to_payload()),
            Metric::Counter(field) => snapshot.totals.get(field).map(|v| v.to_payload()),
            Metric::Select => Some(snapshot.mode.clone()),
        }
    }

    /// Discovery config for a unit whose topics live under `root_topic`
    pub fn discovery<'a>(self, unit: &'a UnitInfo, root_topic: &str) -> Discovery<'a> {
        let (device_class, state_class, unit_of_measurement) = match self {
            Metric::Gauge(Field::InstantSoc) => {
                (Some("battery"), Some("measurement"), Some("%"))
            }
            Metric::Gauge(_) => (Some("power"), Some("measurement"), Some("W")),
            Metric::Counter(_) => (Some("energy"), Some("total_increasing"), Some("kWh")),
            Metric::Select => (None, None, None),
        };
        let (command_topic, options) = match self {
            Metric::Select => (
                Some(format!("{}/{}", root_topic, COMMAND_TOPIC)),
                Some(BatteryMode::ALL.map(BatteryMode::as_str).to_vec()),
            ),
            _ => (None, None),
        };

        Discovery {
            name: self.name(),
            unique_id: self.unique_id(&unit.id),
            state_topic: format!("{}/{}", root_topic, self.topic()),
            availability_topic: format!("{}/{}", root_topic, ONLINE_TOPIC),
            payload_available: "true",
            payload_not_available: "false",
            device_class,
            state_class,
            unit_of_measurement,
            command_topic,
            options,
            device: DiscoveryDevice {
                identifiers: vec![unit.id.as_str()],
                manufacturer: MANUFACTURER,
                model: &unit.model,
                name: &unit.id,
                sw_version: &unit.eprom_id,
            },
        }
    }
}
