//! Fire/no-fire classification over calibrated readings.
//!
//! The decision artifact is loaded once at start-up and shared read-only for
//! the process lifetime. Callers hold it behind the [`Classifier`] trait so
//! tests can substitute a fixed verdict.

use crate::models::{ClassificationOutcome, Features};

mod forest;

pub use forest::{ArtifactError, RandomForest};

/// A pre-loaded binary classifier.
///
/// Calls are infallible: a classifier that can be constructed can classify
/// any finite feature vector.
pub trait Classifier: Send + Sync {
    /// Discrete label, `true` for the positive (fire) class.
    fn predict(&self, features: &Features) -> bool;

    /// Class probabilities `[p_no_fire, p_fire]`.
    fn predict_probability(&self, features: &Features) -> [f64; 2];

    /// Label and positive-class confidence for one reading.
    fn classify(&self, features: &Features) -> ClassificationOutcome {
        // ---
        let [_, p_fire] = self.predict_probability(features);
        ClassificationOutcome {
            is_alarm: self.predict(features),
            fire_risk_percent: (p_fire * 100.0).clamp(0.0, 100.0),
        }
    }
}
