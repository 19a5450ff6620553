//! Focus heuristic.
//!
//! An experimental score, not a validated physiological measure: elevated
//! heart rate together with suppressed RMSSD pushes it up from a neutral 50.
//! The weights are empirical and must not be retuned without new
//! calibration data.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASELINE_HR_BPM: f64 = 70.0;
pub const DEFAULT_BASELINE_RMSSD_MS: f64 = 40.0;

const NEUTRAL: f64 = 50.0;
const HR_WEIGHT: f64 = 20.0;
const RMSSD_WEIGHT: f64 = 30.0;

/// Resting reference the focus score is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub heart_rate_bpm: f64,
    pub rmssd_ms: f64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            heart_rate_bpm: DEFAULT_BASELINE_HR_BPM,
            rmssd_ms: DEFAULT_BASELINE_RMSSD_MS,
        }
    }
}

/// Score in 0..=100. Overflowing inputs saturate; an undefined (NaN)
/// combination falls back to the neutral 50.
pub fn focus_score(heart_rate_bpm: f64, rmssd_ms: f64, baseline: &Baseline) -> u8 {
    let hr_z = (heart_rate_bpm - baseline.heart_rate_bpm) / (0.1 * baseline.heart_rate_bpm).max(5.0);
    let rm_z = (baseline.rmssd_ms - rmssd_ms) / (0.25 * baseline.rmssd_ms).max(10.0);
    let raw = (NEUTRAL + HR_WEIGHT * hr_z + RMSSD_WEIGHT * rm_z).round();
    if raw.is_nan() {
        return NEUTRAL as u8;
    }
    raw.clamp(0.0, 100.0) as u8
}
