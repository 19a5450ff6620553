use crate::{buffer::WindowedBuffer, signal::InterBeatInterval};

/// Configurable parameters for the streaming pulse peak detector.
#[derive(Debug, Clone, Copy)]
pub struct PeakDetectorConfig {
    /// Recency window for the adaptive threshold (seconds).
    pub window_s: f64,
    /// Standard deviations above the window mean a peak must reach.
    pub threshold_scale: f64,
    /// Minimum spacing between accepted peaks (seconds).
    pub refractory_s: f64,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            window_s: 5.0,
            threshold_scale: 0.6,
            refractory_s: 0.333,
        }
    }
}

/// One-sample-delayed local-maximum detector over the filtered waveform.
///
/// Each tick the second-to-last filtered sample is tested, so both of its
/// neighbours are known.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    cfg: PeakDetectorConfig,
    last_peak: Option<f64>,
}

impl PeakDetector {
    pub fn new(cfg: PeakDetectorConfig) -> Self {
        Self {
            cfg,
            last_peak: None,
        }
    }

    pub fn last_peak(&self) -> Option<f64> {
        self.last_peak
    }

    /// Test the candidate at the tail of `buffer`. Returns the interval closed
    /// by an accepted peak, if there was a previous one.
    pub fn update(&mut self, buffer: &WindowedBuffer) -> Option<InterBeatInterval> {
        let values = buffer.filtered_values();
        let n = values.len();
        if n < 3 {
            return None;
        }
        let recent = buffer.suffix_len(self.cfg.window_s);
        let window: Vec<f64> = values.range(n - recent..).copied().collect();
        let threshold = adaptive_threshold(&window, self.cfg.threshold_scale);

        let (prev, cand, next) = (values[n - 3], values[n - 2], values[n - 1]);
        if !(cand > threshold && cand > prev && cand > next) {
            return None;
        }

        let at = buffer.timestamps()[n - 2];
        match self.last_peak {
            Some(last) if at - last < self.cfg.refractory_s => None,
            Some(last) => {
                self.last_peak = Some(at);
                log::trace!("peak at {at:.3}s, interval {:.3}s", at - last);
                Some(InterBeatInterval {
                    ended_at: at,
                    seconds: at - last,
                })
            }
            None => {
                self.last_peak = Some(at);
                log::trace!("first peak at {at:.3}s");
                None
            }
        }
    }
}

/// `mean + scale * sd` with the sample standard deviation. A flat or
/// single-sample window degrades to the mean.
pub fn adaptive_threshold(window: &[f64], scale: f64) -> f64 {
    let n = window.len();
    if n == 0 {
        return 0.0;
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let sd = if n > 1 {
        (window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    mean + scale * sd
}
