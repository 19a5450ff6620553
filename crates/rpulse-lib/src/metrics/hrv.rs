use serde::{Deserialize, Serialize};

/// Fewest intervals for which RMSSD is reported.
pub const MIN_RMSSD_INTERVALS: usize = 3;

/// Time-domain summary of an inter-beat interval set, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvSummary {
    pub n: usize,
    pub mean_ibi_ms: f64,
    pub sdnn_ms: f64,
    pub rmssd_ms: Option<f64>,
    pub pnn50: f64,
}

/// Root mean square of successive differences, in milliseconds.
///
/// Needs at least three intervals (two differences); returns `None` below that.
pub fn rmssd(intervals_s: &[f64]) -> Option<f64> {
    if intervals_s.len() < MIN_RMSSD_INTERVALS {
        return None;
    }
    let mean_sq = intervals_s
        .windows(2)
        .map(|w| (w[1] * 1000.0 - w[0] * 1000.0).powi(2))
        .sum::<f64>()
        / (intervals_s.len() - 1) as f64;
    let value = mean_sq.sqrt();
    value.is_finite().then_some(value)
}

pub fn hrv_summary(intervals_s: &[f64]) -> HrvSummary {
    let n = intervals_s.len();
    let ms: Vec<f64> = intervals_s.iter().map(|s| s * 1000.0).collect();
    let mean_ibi_ms = if n > 0 {
        ms.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };
    let sdnn_ms = if n > 1 {
        (ms.iter().map(|x| (x - mean_ibi_ms).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    let pnn50 = if n > 1 {
        let count = ms.windows(2).filter(|w| (w[1] - w[0]).abs() > 50.0).count();
        count as f64 / (n as f64 - 1.0)
    } else {
        0.0
    };
    HrvSummary {
        n,
        mean_ibi_ms,
        sdnn_ms,
        rmssd_ms: rmssd(intervals_s),
        pnn50,
    }
}
