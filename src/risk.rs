//! Mapping of classifier output onto the operator-facing risk status.

use crate::models::{ClassificationOutcome, RiskStatus};

/// Fire risk percentage strictly above which a non-alarm sample is a warning.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 50.0;

/// Decision table over `(is_alarm, fire_risk_percent)`.
///
/// The classifier label takes precedence over its probability: an alarm is
/// always `Critical`, even at low confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskPolicy {
    warning_threshold: f64,
}

impl RiskPolicy {
    pub fn new(warning_threshold: f64) -> Self {
        Self { warning_threshold }
    }

    pub fn warning_threshold(&self) -> f64 {
        self.warning_threshold
    }

    pub fn classify(&self, outcome: &ClassificationOutcome) -> RiskStatus {
        // ---
        if outcome.is_alarm {
            RiskStatus::Critical
        } else if outcome.fire_risk_percent > self.warning_threshold {
            RiskStatus::Warning
        } else {
            RiskStatus::Safe
        }
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_THRESHOLD)
    }
}
