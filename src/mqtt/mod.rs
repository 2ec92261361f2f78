//! MQTT publishing module
//!
//! Exposes snapshots as Home Assistant entities and receives mode commands.

pub mod context;
pub mod metrics;
pub mod publisher;

pub use metrics::{catalogue, Metric};
pub use publisher::MqttPublisher;
