//! Human-readable operator report, one line per processed message.
//!
//! This is a diagnostic stream, not a machine contract.

use std::fmt;

use crate::models::{CalibratedReading, ClassificationOutcome, RiskStatus, TelemetryMessage};

pub struct OperatorReport<'a> {
    pub message: &'a TelemetryMessage,
    pub reading: &'a CalibratedReading,
    pub outcome: &'a ClassificationOutcome,
    pub status: RiskStatus,
}

impl fmt::Display for OperatorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(
            f,
            "[{}] node={} gas={} (calib {:.0}) temp={}°C humidity={}% status={} ",
            self.message.received_at.format("%H:%M:%S"),
            self.message.node_id,
            self.message.raw_gas,
            self.reading.gas_ppm,
            self.message.temperature,
            self.message.humidity,
            self.status,
        )?;

        if self.outcome.is_alarm {
            write!(f, "FIRE DETECTED (confidence {:.1}%)", self.outcome.fire_risk_percent)
        } else {
            write!(f, "normal environment (risk {:.1}%)", self.outcome.fire_risk_percent)
        }
    }
}

impl OperatorReport<'_> {
    /// Write the report to the `operator` log target.
    pub fn emit(&self) {
        match self.status {
            RiskStatus::Critical => tracing::warn!(target: "operator", "{}", self),
            _ => tracing::info!(target: "operator", "{}", self),
        }
    }
}
