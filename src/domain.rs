//! ==============================================================================
//! domain.rs - readings, thresholds and the shapes exchanged with the api
//! ==============================================================================
//!
//! purpose:
//!     defines the data model shared by the store, the external feed adapter
//!     and the http layer.
//!
//! relationships:
//!     - used by: store.rs (owns readings + thresholds)
//!     - used by: feed.rs (external readings are mapped into Reading)
//!     - used by: api.rs (request/response bodies)
//!
//! ==============================================================================

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DashboardError;

/// device id used when the sender does not identify itself
pub const DEFAULT_DEVICE_ID: &str = "esp32_001";

/// device id given to external readings that carry none
pub const EXTERNAL_DEVICE_ID: &str = "external";

// ==============================================================================
// reading
// ==============================================================================

/// identifier of a reading
///
/// local readings get an epoch-millisecond id, external readings keep
/// whatever identifier the provider used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingId {
    Local(u64),
    External(String),
}

/// one sensor sample with its derived alert flag
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub id: ReadingId,
    pub device_id: String,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// illuminance, arbitrary unit
    pub light: i64,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// evaluated once, against the thresholds in effect when the reading arrived
    pub alert: bool,
}

/// renders timestamps like `2024-05-01T12:00:00.000Z`
fn serialize_iso_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ==============================================================================
// thresholds
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub light_min: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_max: 30.0,
            humidity_min: 40.0,
            light_min: 500,
        }
    }
}

impl Thresholds {
    /// true when any of the three bounds is violated
    pub fn is_alert(&self, temperature: f64, humidity: f64, light: i64) -> bool {
        temperature > self.temperature_max
            || humidity < self.humidity_min
            || light < self.light_min
    }

    /// applies a partial update
    ///
    /// every supplied field is parsed before anything is written, so a bad
    /// field leaves the whole configuration untouched.
    pub fn apply(&mut self, update: &ThresholdsUpdate) -> Result<(), DashboardError> {
        let temperature_max = update
            .temperature_max
            .as_ref()
            .map(|v| v.to_f64("temperature_max"))
            .transpose()?;
        let humidity_min = update
            .humidity_min
            .as_ref()
            .map(|v| v.to_f64("humidity_min"))
            .transpose()?;
        let light_min = update
            .light_min
            .as_ref()
            .map(|v| v.to_i64("light_min"))
            .transpose()?;

        if let Some(v) = temperature_max {
            self.temperature_max = v;
        }
        if let Some(v) = humidity_min {
            self.humidity_min = v;
        }
        if let Some(v) = light_min {
            self.light_min = v;
        }
        Ok(())
    }
}

/// partial thresholds; absent (or null) fields keep their current value
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ThresholdsUpdate {
    #[serde(default)]
    pub temperature_max: Option<NumericInput>,
    #[serde(default)]
    pub humidity_min: Option<NumericInput>,
    #[serde(default)]
    pub light_min: Option<NumericInput>,
}

// ==============================================================================
// inbound values
// ==============================================================================

/// a number as sent by a device or a form: json number or numeric string
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

impl From<&str> for NumericInput {
    fn from(v: &str) -> Self {
        NumericInput::Text(v.to_string())
    }
}

impl NumericInput {
    pub fn to_f64(&self, field: &str) -> Result<f64, DashboardError> {
        let value = match self {
            NumericInput::Number(n) => Some(*n),
            NumericInput::Text(s) => s.trim().parse::<f64>().ok(),
        };
        match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(DashboardError::Validation(format!(
                "{field} must be a number, got {}",
                self.describe()
            ))),
        }
    }

    /// integer parse; fractional values are truncated toward zero,
    /// values outside the i64 range are rejected instead of saturated
    pub fn to_i64(&self, field: &str) -> Result<i64, DashboardError> {
        if let NumericInput::Text(s) = self {
            if let Ok(v) = s.trim().parse::<i64>() {
                return Ok(v);
            }
        }
        let v = self.to_f64(field)?.trunc();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if v >= i64::MIN as f64 && v < i64::MAX as f64 {
            Ok(v as i64)
        } else {
            Err(DashboardError::Validation(format!(
                "{field} is out of range, got {}",
                self.describe()
            )))
        }
    }

    fn describe(&self) -> String {
        match self {
            NumericInput::Number(n) => n.to_string(),
            NumericInput::Text(s) => format!("{s:?}"),
        }
    }
}

/// body of `POST /api/sensor-data`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub temperature: Option<NumericInput>,
    #[serde(default)]
    pub humidity: Option<NumericInput>,
    #[serde(default)]
    pub light: Option<NumericInput>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// an ingest request after numeric parsing
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedSample {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light: i64,
}

impl IngestRequest {
    pub fn parse(&self) -> Result<ParsedSample, DashboardError> {
        let temperature = required(&self.temperature, "temperature")?.to_f64("temperature")?;
        let humidity = required(&self.humidity, "humidity")?.to_f64("humidity")?;
        let light = required(&self.light, "light")?.to_i64("light")?;
        let device_id = match self.device_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => DEFAULT_DEVICE_ID.to_string(),
        };
        Ok(ParsedSample {
            device_id,
            temperature,
            humidity,
            light,
        })
    }
}

fn required<'a>(
    value: &'a Option<NumericInput>,
    field: &str,
) -> Result<&'a NumericInput, DashboardError> {
    value
        .as_ref()
        .ok_or_else(|| DashboardError::Validation(format!("{field} is required")))
}

// ==============================================================================
// external feed
// ==============================================================================

/// a reading as delivered by the external feed, already normalized
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalReading {
    pub id: String,
    pub device_id: Option<String>,
    pub temperature: f64,
    pub humidity: f64,
    pub light: i64,
    pub timestamp: DateTime<Utc>,
}

impl ExternalReading {
    /// maps into the internal shape; the alert flag uses OUR thresholds
    pub fn into_reading(self, thresholds: &Thresholds) -> Reading {
        let alert = thresholds.is_alert(self.temperature, self.humidity, self.light);
        Reading {
            id: ReadingId::External(self.id),
            device_id: self
                .device_id
                .unwrap_or_else(|| EXTERNAL_DEVICE_ID.to_string()),
            temperature: self.temperature,
            humidity: self.humidity,
            light: self.light,
            timestamp: self.timestamp,
            alert,
        }
    }
}

// ==============================================================================
// query results
// ==============================================================================

/// rolling statistics over the last 24 hours
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats24h {
    pub total_readings: usize,
    pub alerts: usize,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_light: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub latest: Option<Reading>,
    pub thresholds: Thresholds,
    pub stats_24h: Stats24h,
}

/// windowed listing, most recent arrival first
#[derive(Clone, Debug, PartialEq)]
pub struct RecentReadings {
    pub readings: Vec<Reading>,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub total_readings: usize,
}
