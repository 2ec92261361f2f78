//! Powervault to MQTT Bridge
//!
//! Polls the Powervault cloud API for a home battery and republishes its
//! readings as Home Assistant entities over MQTT.

pub mod config;
pub mod errors;
pub mod mqtt;
pub mod powervault;
pub mod refresh;

pub use config::Config;
pub use mqtt::publisher::MqttPublisher;
pub use powervault::client::{PowervaultApi, PowervaultClient};
pub use refresh::{refresh, refresh_with_retry, Snapshot};
