/// Exponential moving average of the tick rate.
///
/// Camera and display callbacks do not tick at a fixed rate, so every
/// frequency-dependent stage asks the clock for the current estimate.
#[derive(Debug, Clone)]
pub struct SamplingClock {
    fps_ema: f64,
    last_tick: Option<f64>,
}

pub const INITIAL_RATE_HZ: f64 = 30.0;
pub const MIN_RATE_HZ: f64 = 10.0;
pub const MAX_RATE_HZ: f64 = 90.0;
const MIN_DT_S: f64 = 1.0 / 120.0;
const EMA_KEEP: f64 = 0.9;

impl Default for SamplingClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingClock {
    pub fn new() -> Self {
        Self {
            fps_ema: INITIAL_RATE_HZ,
            last_tick: None,
        }
    }

    /// Register a tick and return the rounded rate for it, in [10, 90] Hz.
    ///
    /// The first tick has no predecessor and keeps the initial estimate.
    pub fn tick(&mut self, timestamp: f64) -> u32 {
        if let Some(prev) = self.last_tick {
            let dt = (timestamp - prev).max(MIN_DT_S);
            let instantaneous = 1.0 / dt;
            self.fps_ema = self.fps_ema * EMA_KEEP + instantaneous * (1.0 - EMA_KEEP);
        }
        self.last_tick = Some(timestamp);
        self.rate_hz()
    }

    pub fn rate_hz(&self) -> u32 {
        self.fps_ema.clamp(MIN_RATE_HZ, MAX_RATE_HZ).round() as u32
    }

    pub fn fps_ema(&self) -> f64 {
        self.fps_ema
    }
}
