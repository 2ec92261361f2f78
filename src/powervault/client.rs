//! Powervault cloud API client
//!
//! Blocking HTTP interface over the Powervault v3 REST API.

use std::time::Duration;

use chrono::{Months, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ureq::Agent;

use super::types::*;
use crate::errors::PowervaultError;

const API_KEY_HEADER: &str = "x-api-key";

/// Length of a manual state override; effectively "until changed again".
const STATE_OVERRIDE_MONTHS: u32 = 100 * 12;

/// Queries the bridge needs from the vendor API
///
/// Implementations issue exactly one request per call and never retry.
pub trait PowervaultApi {
    fn get_unit(&self, unit_id: &str) -> Result<UnitInfo, PowervaultError>;

    fn get_data(&self, unit_id: &str, period: Period) -> Result<Series, PowervaultError>;

    fn get_battery_mode(&self, unit_id: &str) -> Result<String, PowervaultError>;

    fn set_battery_mode(&self, unit_id: &str, mode: BatteryMode) -> Result<(), PowervaultError>;

    /// Latest reading, most recent first
    fn fetch_current(&self, unit_id: &str) -> Result<Series, PowervaultError> {
        self.get_data(unit_id, Period::Latest)
    }

    fn fetch_past_hour(&self, unit_id: &str) -> Result<Series, PowervaultError> {
        self.get_data(unit_id, Period::PastHour)
    }

    fn fetch_today(&self, unit_id: &str) -> Result<Series, PowervaultError> {
        self.get_data(unit_id, Period::Today)
    }

    fn fetch_mode(&self, unit_id: &str) -> Result<String, PowervaultError> {
        self.get_battery_mode(unit_id)
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    account: Account,
}

/// Customer account owning the API key
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: serde_json::Value,
}

impl Account {
    /// Account id as used in query strings; the API returns it as a number or a string.
    pub fn id(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UnitsResponse {
    #[serde(default)]
    units: Vec<UnitInfo>,
}

#[derive(Deserialize)]
struct UnitResponse {
    unit: UnitInfo,
}

#[derive(Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Option<Series>,
}

#[derive(Deserialize)]
struct StateOverridesResponse {
    #[serde(rename = "stateOverrides", default)]
    state_overrides: Vec<StateOverride>,
}

#[derive(Serialize, Deserialize)]
struct StateOverride {
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<i64>,
}

#[derive(Serialize)]
struct SetStateOverrides {
    #[serde(rename = "stateOverrides")]
    state_overrides: Vec<StateOverride>,
}

/// Powervault API client
///
/// Owns its connection pool; construct once and pass it around.
pub struct PowervaultClient {
    agent: Agent,
    base_url: String,
    api_key: String,
}

fn request_failed(path: &str, error: ureq::Error) -> PowervaultError {
    PowervaultError::RequestFailed {
        path: path.to_string(),
        reason: error.to_string(),
    }
}

impl PowervaultClient {
    /// Create a new Powervault client
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, PowervaultError> {
        debug!("GET {} {:?}", path, query);
        let mut request = self
            .agent
            .get(self.url(path))
            .header(API_KEY_HEADER, self.api_key.as_str());
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = request.call().map_err(|e| request_failed(path, e))?;
        response
            .body_mut()
            .read_json::<R>()
            .map_err(|e| PowervaultError::ParseError(format!("`{}`: {}", path, e)))
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), PowervaultError> {
        debug!("POST {}", path);
        self.agent
            .post(self.url(path))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .send_json(body)
            .map_err(|e| request_failed(path, e))?;
        Ok(())
    }

    /// Account the API key belongs to
    pub fn get_account(&self) -> Result<Account, PowervaultError> {
        let response: AccountResponse = self.get("account", &[])?;
        Ok(response.account)
    }

    /// All units registered to an account
    pub fn get_units(&self, account_id: &str) -> Result<Vec<UnitInfo>, PowervaultError> {
        let response: UnitsResponse = self.get("unit", &[("customerAccountId", account_id)])?;
        Ok(response.units)
    }
}

impl PowervaultApi for PowervaultClient {
    fn get_unit(&self, unit_id: &str) -> Result<UnitInfo, PowervaultError> {
        let response: UnitResponse = self.get(&format!("unit/{}", unit_id), &[])?;
        Ok(response.unit)
    }

    fn get_data(&self, unit_id: &str, period: Period) -> Result<Series, PowervaultError> {
        let path = format!("unit/{}/data", unit_id);
        let response: DataResponse = match period.as_query() {
            Some(p) => self.get(&path, &[("period", p)])?,
            None => self.get(&path, &[])?,
        };
        let series = response.data.unwrap_or_default();
        debug!("Fetched {} reading(s) for {:?}", series.len(), period);
        Ok(series)
    }

    fn get_battery_mode(&self, unit_id: &str) -> Result<String, PowervaultError> {
        let response: StateOverridesResponse =
            self.get(&format!("unit/{}/stateOverride", unit_id), &[])?;
        Ok(response
            .state_overrides
            .into_iter()
            .next()
            .map(|o| o.status)
            .unwrap_or_else(|| BatteryMode::Normal.to_string()))
    }

    fn set_battery_mode(&self, unit_id: &str, mode: BatteryMode) -> Result<(), PowervaultError> {
        let now = Utc::now();
        let end = now
            .checked_add_months(Months::new(STATE_OVERRIDE_MONTHS))
            .unwrap_or(now);
        let body = SetStateOverrides {
            state_overrides: vec![StateOverride {
                status: mode.to_string(),
                start: Some(now.timestamp()),
                end: Some(end.timestamp()),
            }],
        };
        info!("Setting battery mode of {} to {}", unit_id, mode);
        self.post(&format!("unit/{}/stateOverride", unit_id), &body)
    }
}
