//! Data models for the telemetry pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationRange;

pub const DEFAULT_NODE_ID: &str = "node_unknown";
pub const DEFAULT_RAW_GAS: f64 = 0.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_HUMIDITY: f64 = 50.0;

// ---

/// Wire shape of a telemetry payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TelemetryPayload {
    // ---
    #[serde(default = "default_node_id")]
    node_id: String,
    #[serde(default = "default_raw_gas")]
    raw_gas: f64,
    #[serde(default = "default_temperature")]
    temp: f64,
    #[serde(default = "default_humidity")]
    humidity: f64,
}

fn default_node_id() -> String {
    DEFAULT_NODE_ID.to_string()
}

fn default_raw_gas() -> f64 {
    DEFAULT_RAW_GAS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_humidity() -> f64 {
    DEFAULT_HUMIDITY
}

/// One sensor report as received from the channel, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    // ---
    pub node_id: String,
    pub raw_gas: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub received_at: DateTime<Utc>,
}

impl TelemetryMessage {
    // ---
    /// Decode a JSON object payload. Missing fields take their defaults;
    /// anything that is not a JSON object with well-typed fields is an error.
    pub fn decode(payload: &[u8], received_at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        // ---
        let wire: TelemetryPayload = serde_json::from_slice(payload)?;

        Ok(TelemetryMessage {
            node_id: wire.node_id,
            raw_gas: wire.raw_gas,
            temperature: wire.temp,
            humidity: wire.humidity,
            received_at,
        })
    }

    pub fn calibrate(&self, gas_range: &CalibrationRange) -> CalibratedReading {
        // ---
        CalibratedReading {
            node_id: self.node_id.clone(),
            temperature: self.temperature,
            humidity: self.humidity,
            gas_ppm: gas_range.apply(self.raw_gas),
        }
    }
}

/// A telemetry sample with its gas reading in calibrated units.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedReading {
    // ---
    pub node_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub gas_ppm: f64,
}

impl CalibratedReading {
    /// Classifier input, ordered `[temperature, humidity, calibrated gas]`.
    pub fn features(&self) -> Features {
        [self.temperature, self.humidity, self.gas_ppm]
    }
}

/// Number of classifier input features.
pub const FEATURE_COUNT: usize = 3;

/// `[temperature, humidity, calibrated gas]`
pub type Features = [f64; FEATURE_COUNT];

/// Classifier verdict for a single reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationOutcome {
    // ---
    pub is_alarm: bool,
    /// Positive-class probability scaled to `[0, 100]`.
    pub fire_risk_percent: f64,
}

/// Operator-facing severity, ordered `Safe < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Safe,
    Warning,
    Critical,
}

impl RiskStatus {
    /// Value stored in the `alert_status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Safe => "SAFE",
            RiskStatus::Warning => "WARNING",
            RiskStatus::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted unit, one per processed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorLogRecord {
    // ---
    pub node_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub gas_ppm: f64,
    pub fire_risk_percent: f64,
    pub status: RiskStatus,
}

impl SensorLogRecord {
    pub fn new(reading: &CalibratedReading, outcome: &ClassificationOutcome, status: RiskStatus) -> Self {
        // ---
        SensorLogRecord {
            node_id: reading.node_id.clone(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            gas_ppm: reading.gas_ppm,
            fire_risk_percent: outcome.fire_risk_percent,
            status,
        }
    }
}
