//! Linear calibration of raw sensor units into physical units.

use thiserror::Error;

/// Lower bound of the gas sensor ADC reading.
pub const GAS_RAW_MIN: f64 = 0.0;
/// Upper bound of the gas sensor ADC reading (12-bit).
pub const GAS_RAW_MAX: f64 = 4095.0;
/// Calibrated gas level at `GAS_RAW_MIN`.
pub const GAS_PPM_MIN: f64 = 0.0;
/// Calibrated gas level at `GAS_RAW_MAX`.
pub const GAS_PPM_MAX: f64 = 1000.0;

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("input range [{0}, {0}] has zero width")]
    ZeroWidth(f64),

    #[error("range bound {0} is not finite")]
    NonFinite(f64),
}

/// Affine map of `raw` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Values outside the input range extrapolate along the same line. The caller
/// guarantees `in_min != in_max`; see [`CalibrationRange`] for a checked form.
pub fn calibrate(raw: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    // ---
    (raw - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// A validated calibration range, built once at start-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRange {
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
}

impl CalibrationRange {
    // ---
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Result<Self, CalibrationError> {
        // ---
        for bound in [in_min, in_max, out_min, out_max] {
            if !bound.is_finite() {
                return Err(CalibrationError::NonFinite(bound));
            }
        }
        if in_min == in_max {
            return Err(CalibrationError::ZeroWidth(in_min));
        }

        Ok(Self {
            in_min,
            in_max,
            out_min,
            out_max,
        })
    }

    /// The raw gas ADC range mapped onto the calibrated gas scale.
    pub fn gas() -> Self {
        Self {
            in_min: GAS_RAW_MIN,
            in_max: GAS_RAW_MAX,
            out_min: GAS_PPM_MIN,
            out_max: GAS_PPM_MAX,
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        calibrate(raw, self.in_min, self.in_max, self.out_min, self.out_max)
    }
}

impl Default for CalibrationRange {
    fn default() -> Self {
        Self::gas()
    }
}
