use serde::{Deserialize, Serialize};

/// One brightness reading per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic arrival time in seconds
    pub timestamp: f64,
    /// Mean region brightness
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Output of the filter bank, time-aligned 1:1 with [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub timestamp: f64,
    pub value: f64,
}

/// A uniformly-resampled view of a buffer suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Effective sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Inter-beat interval between two accepted peaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterBeatInterval {
    /// Timestamp of the peak that closed the interval
    pub ended_at: f64,
    /// Interval length in seconds, always positive
    pub seconds: f64,
}

impl InterBeatInterval {
    pub fn millis(&self) -> f64 {
        self.seconds * 1000.0
    }
}
