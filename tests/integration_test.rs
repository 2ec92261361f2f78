//! Integration tests for powervault-mqtt-rs
//!
//! These tests verify the core functionality without requiring access to the Powervault API.

use approx::assert_relative_eq;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use powervault_mqtt_rs::config::{Config, MqttConfig, PowervaultConfig};
use powervault_mqtt_rs::errors::{MqttError, PowervaultError, RefreshError};
use powervault_mqtt_rs::mqtt::context::MqttPayload;
use powervault_mqtt_rs::mqtt::{catalogue, Metric};
use powervault_mqtt_rs::powervault::{
    BatteryMode, Field, Period, PowervaultApi, Reading, Series, UnitInfo,
};
use powervault_mqtt_rs::refresh::{refresh, refresh_with_retry};
use std::cell::{Cell, RefCell};
use std::time::Duration;

// ============================================================================
// Fake API
// ============================================================================

/// In-memory API serving fixed series, optionally failing the first requests
#[derive(Default)]
struct FakeApi {
    current: Series,
    past_hour: Series,
    today: Series,
    mode: String,
    failures: Cell<u32>,
    requests: RefCell<Vec<Period>>,
}

impl FakeApi {
    fn requested(&self, period: Period) -> usize {
        self.requests.borrow().iter().filter(|p| **p == period).count()
    }
}

impl PowervaultApi for FakeApi {
    fn get_unit(&self, unit_id: &str) -> Result<UnitInfo, PowervaultError> {
        Ok(UnitInfo {
            id: unit_id.to_string(),
            model: "P3".to_string(),
            eprom_id: "1".to_string(),
        })
    }

    fn get_data(&self, _unit_id: &str, period: Period) -> Result<Series, PowervaultError> {
        self.requests.borrow_mut().push(period);
        if self.failures.get() > 0 && period == Period::Latest {
            self.failures.set(self.failures.get() - 1);
            return Err(PowervaultError::RequestFailed {
                path: "unit/PV1/data".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(match period {
            Period::Latest => self.current.clone(),
            Period::PastHour => self.past_hour.clone(),
            Period::Today => self.today.clone(),
        })
    }

    fn get_battery_mode(&self, _unit_id: &str) -> Result<String, PowervaultError> {
        Ok(self.mode.clone())
    }

    fn set_battery_mode(&self, _unit_id: &str, _mode: BatteryMode) -> Result<(), PowervaultError> {
        Ok(())
    }
}

/// Current reading with every power flow at 100 W, overridden by `extra`
fn current_reading(extra: &[(Field, Option<f64>)]) -> Reading {
    let mut reading = Reading::from_fields(
        Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()),
        std::iter::once((Field::InstantSoc, Some(55.0))).chain(Field::POWER.map(|f| (f, Some(100.0)))),
    );
    for (field, value) in extra {
        reading.values.insert(field.key().to_string(), *value);
    }
    reading
}

fn today_series() -> Series {
    vec![Reading::from_fields(
        None,
        [
            (Field::InstantSoc, Some(50.0)),
            (Field::InstantBattery, Some(0.0)),
            (Field::SolarGenerated, Some(1200.0)),
        ],
    )]
}

fn api_with_current(current: Reading) -> FakeApi {
    FakeApi {
        current: vec![current],
        today: today_series(),
        mode: "normal".to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Refresh Pipeline Tests
// ============================================================================

#[test]
fn test_refresh_fills_gap_from_past_hour() {
    let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut api = api_with_current(current_reading(&[(Field::InstantBattery, None)]));
    api.past_hour = vec![
        Reading::from_fields(
            Some(t - ChronoDuration::minutes(10)),
            [(Field::InstantBattery, Some(300.0))],
        ),
        Reading::from_fields(
            Some(t - ChronoDuration::minutes(5)),
            [(Field::InstantBattery, None)],
        ),
    ];

    let snapshot = refresh(&api, "PV1").unwrap();

    assert_eq!(snapshot.get(Field::InstantBattery), Some(300.0));
    assert_eq!(snapshot.charge(), 55.0);
    assert_eq!(snapshot.time, Some(t));
    assert_eq!(api.requested(Period::PastHour), 1);
}

#[test]
fn test_refresh_skips_past_hour_without_gaps() {
    let api = api_with_current(current_reading(&[]));

    let snapshot = refresh(&api, "PV1").unwrap();

    assert_eq!(snapshot.get(Field::InstantBattery), Some(100.0));
    assert_eq!(api.requested(Period::PastHour), 0);
    assert_eq!(api.requested(Period::Today), 1);
    assert_eq!(snapshot.mode, "normal");
}

#[test]
fn test_refresh_fails_on_empty_current_series() {
    let api = FakeApi {
        today: today_series(),
        ..Default::default()
    };

    let result = refresh(&api, "PV1");

    assert!(matches!(result, Err(RefreshError::DataIncomplete(_))));
    // The cycle stops before anything else is fetched
    assert_eq!(api.requested(Period::Today), 0);
}

#[test]
fn test_refresh_fails_on_empty_today_series() {
    let mut api = api_with_current(current_reading(&[]));
    api.today = Vec::new();

    assert!(matches!(
        refresh(&api, "PV1"),
        Err(RefreshError::DataIncomplete(_))
    ));
}

#[test]
fn test_refresh_fails_on_unresolved_gap() {
    let api = api_with_current(current_reading(&[(Field::InstantGrid, None)]));

    let error = refresh(&api, "PV1").unwrap_err();

    assert!(matches!(error, RefreshError::DataIncomplete(_)));
    assert!(error.to_string().contains("instant_grid"));
}

#[test]
fn test_refresh_aggregates_live_rows_only() {
    let mut api = api_with_current(current_reading(&[]));
    api.today = vec![
        Reading::from_fields(
            None,
            [
                (Field::InstantSoc, Some(50.0)),
                (Field::InstantBattery, Some(-200.0)),
                (Field::SolarGenerated, Some(1200.0)),
                (Field::HomeConsumed, Some(600.0)),
            ],
        ),
        // No battery reading: excluded
        Reading::from_fields(
            None,
            [
                (Field::InstantSoc, Some(50.0)),
                (Field::SolarGenerated, Some(1200.0)),
            ],
        ),
        // Null battery reading: excluded too
        Reading::from_fields(
            None,
            [
                (Field::InstantSoc, Some(50.0)),
                (Field::InstantBattery, None),
                (Field::SolarGenerated, Some(1200.0)),
            ],
        ),
        Reading::from_fields(
            None,
            [
                (Field::InstantSoc, Some(51.0)),
                (Field::InstantBattery, Some(0.0)),
                (Field::SolarGenerated, Some(1200.0)),
            ],
        ),
    ];

    let snapshot = refresh(&api, "PV1").unwrap();

    assert_relative_eq!(snapshot.totals.get(Field::SolarGenerated).unwrap(), 0.2);
    assert_relative_eq!(snapshot.totals.get(Field::HomeConsumed).unwrap(), 0.05);
    assert_eq!(snapshot.totals.get(Field::SolarExported), Some(0.0));
    assert_eq!(snapshot.totals.len(), Field::TOTALS.len());
}

#[test]
fn test_refresh_clamps_implausible_solar() {
    let api = api_with_current(current_reading(&[(Field::InstantSolar, Some(15000.0))]));

    let snapshot = refresh(&api, "PV1").unwrap();

    assert_eq!(snapshot.get(Field::InstantSolar), Some(0.0));
}

#[test]
fn test_retry_recovers_from_single_failure() {
    let api = api_with_current(current_reading(&[]));
    api.failures.set(1);

    let snapshot = refresh_with_retry(&api, "PV1", 1).unwrap();

    assert_eq!(snapshot.charge(), 55.0);
    assert_eq!(api.requested(Period::Latest), 2);
}

#[test]
fn test_retry_gives_up_after_second_failure() {
    let api = api_with_current(current_reading(&[]));
    api.failures.set(2);

    let result = refresh_with_retry(&api, "PV1", 1);

    assert!(matches!(
        result,
        Err(RefreshError::Transport(PowervaultError::RequestFailed { .. }))
    ));
    assert_eq!(api.requested(Period::Latest), 2);
}

#[test]
fn test_retry_also_covers_incomplete_data() {
    let api = FakeApi::default();

    assert!(refresh_with_retry(&api, "PV1", 1).is_err());
    assert_eq!(api.requested(Period::Latest), 2);
}

// ============================================================================
// Metric Tests
// ============================================================================

#[test]
fn test_metric_payloads_from_snapshot() {
    let api = api_with_current(current_reading(&[(Field::InstantSoc, Some(55.4))]));
    let snapshot = refresh(&api, "PV1").unwrap();

    assert_eq!(
        Metric::Gauge(Field::InstantSoc).payload(&snapshot),
        Some("55".to_string())
    );
    assert_eq!(
        Metric::Gauge(Field::InstantGrid).payload(&snapshot),
        Some("100".to_string())
    );
    assert_eq!(
        Metric::Counter(Field::SolarGenerated).payload(&snapshot),
        Some("0.1".to_string())
    );
    assert_eq!(Metric::Select.payload(&snapshot), Some("normal".to_string()));
}

#[test]
fn test_every_metric_has_a_payload() {
    let api = api_with_current(current_reading(&[]));
    let snapshot = refresh(&api, "PV1").unwrap();

    for metric in catalogue() {
        assert!(metric.payload(&snapshot).is_some(), "{:?}", metric);
    }
}

#[test]
fn test_discovery_unique_ids_are_distinct() {
    let unit = UnitInfo {
        id: "PV1".to_string(),
        model: "P3".to_string(),
        eprom_id: "1".to_string(),
    };
    let mut ids: Vec<String> = catalogue()
        .into_iter()
        .map(|m| m.discovery(&unit, "powervault/PV1").unique_id)
        .collect();
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_mqtt_config_debug_redacts_password() {
    let config = MqttConfig {
        root: "powervault".to_string(),
        host: Some("mqtt.example.com".to_string()),
        port: 1883,
        socket: None,
        username: "test-user".to_string(),
        password: "secret-password".to_string(),
        discovery_prefix: "homeassistant".to_string(),
    };

    let debug_output = format!("{:?}", config);

    // Password should be redacted
    assert!(!debug_output.contains("secret-password"));
    assert!(debug_output.contains("***REDACTED***"));

    // Username should still be visible
    assert!(debug_output.contains("test-user"));
}

#[test]
fn test_powervault_config_debug_redacts_api_key() {
    let config = PowervaultConfig {
        api_key: "secret-key".to_string(),
        unit_id: "PV-123".to_string(),
        base_url: "https://api.example.com/v3".to_string(),
        interval: Duration::from_secs(30),
        timeout: Duration::from_secs(15),
        retries: 1,
    };

    let debug_output = format!("{:?}", config);

    assert!(!debug_output.contains("secret-key"));
    assert!(debug_output.contains("***REDACTED***"));
    assert!(debug_output.contains("PV-123"));
}

#[test]
fn test_full_config() {
    let config = Config::from_toml(
        r#"
[default]
log_level = "DEBUG"

[powervault]
api_key = "key"
unit_id = "PV-123"
interval = "1m"
timeout = "5s"
retries = 2

[mqtt]
root = "home/battery"
socket = "/run/mosquitto/mqtt.sock"
discovery_prefix = "ha"
"#,
    )
    .unwrap();

    assert_eq!(config.default.log_level.as_str(), "debug");
    assert_eq!(config.powervault.interval, Duration::from_secs(60));
    assert_eq!(config.powervault.timeout, Duration::from_secs(5));
    assert_eq!(config.powervault.retries, 2);
    assert_eq!(config.mqtt.root, "home/battery");
    assert_eq!(config.mqtt.discovery_prefix, "ha");
    assert!(config.mqtt.host.is_none());
}

// ============================================================================
// MQTT Payload Tests
// ============================================================================

#[test]
fn test_mqtt_payload_f64() {
    let value = 42.5_f64;
    assert_eq!(value.to_payload(), "42.5");

    let value = 0.0_f64;
    assert_eq!(value.to_payload(), "0");

    let value = -123.456_f64;
    assert_eq!(value.to_payload(), "-123.456");
}

#[test]
fn test_mqtt_payload_bool() {
    assert_eq!(true.to_payload(), "true");
    assert_eq!(false.to_payload(), "false");
}

#[test]
fn test_mqtt_payload_str() {
    assert_eq!("force-charge".to_payload(), "force-charge");
    assert_eq!("".to_string().to_payload(), "");
}

#[test]
fn test_mqtt_payload_datetime() {
    let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
    let payload = dt.to_payload();

    // Should be RFC3339 format
    assert!(payload.starts_with("2024-01-15T12:30:45"));
}

// ============================================================================
// Error Type Tests
// ============================================================================

#[test]
fn test_request_failed_display() {
    let error = PowervaultError::RequestFailed {
        path: "unit/PV1/data".to_string(),
        reason: "timed out".to_string(),
    };
    let error_string = format!("{}", error);
    assert!(error_string.contains("unit/PV1/data"));
    assert!(error_string.contains("timed out"));

    // Transport failures surface unchanged through a refresh error
    let refresh_error = RefreshError::from(error);
    assert_eq!(refresh_error.to_string(), error_string);
}

#[test]
fn test_mqtt_error_publish_failed() {
    let error = MqttError::PublishFailed {
        topic: "test/topic".to_string(),
        reason: "Connection lost".to_string(),
    };
    let error_string = format!("{}", error);
    assert!(error_string.contains("test/topic"));
    assert!(error_string.contains("Connection lost"));
}

#[test]
fn test_error_type_implements_std_error() {
    let refresh_err = RefreshError::DataIncomplete("current".to_string());
    let _: &dyn std::error::Error = &refresh_err;

    let mqtt_err = MqttError::ClientError("test".to_string());
    let _: &dyn std::error::Error = &mqtt_err;
}
