use std::collections::VecDeque;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Configurable corners for the detrend + band-pass chain.
#[derive(Debug, Clone, Copy)]
pub struct FilterBankConfig {
    /// High-pass corner (Hz).
    pub highpass_hz: f64,
    /// Low-pass corner (Hz).
    pub lowpass_hz: f64,
    /// Quality factor shared by both stages.
    pub q: f64,
    /// Detrend window length (seconds).
    pub detrend_window_s: f64,
}

impl Default for FilterBankConfig {
    fn default() -> Self {
        Self {
            highpass_hz: 0.7,
            lowpass_hz: 3.0,
            q: FRAC_1_SQRT_2,
            detrend_window_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    HighPass,
    LowPass,
}

/// Normalised second-order section coefficients (a0 folded in).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Bilinear-transform coefficients of the analog prototype.
    pub fn design(kind: BiquadKind, fs: f64, corner_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * corner_hz / fs;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        let (b0, b1, b2) = match kind {
            BiquadKind::LowPass => {
                let b = (1.0 - cos_w0) / 2.0;
                (b, 1.0 - cos_w0, b)
            }
            BiquadKind::HighPass => {
                let b = (1.0 + cos_w0) / 2.0;
                (b, -(1.0 + cos_w0), b)
            }
        };
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I biquad whose coefficients can be swapped without
/// clearing the running history.
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BiquadKind,
    corner_hz: f64,
    q: f64,
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    pub fn new(kind: BiquadKind, fs: f64, corner_hz: f64, q: f64) -> Self {
        Self {
            kind,
            corner_hz,
            q,
            coeffs: BiquadCoeffs::design(kind, fs, corner_hz, q),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn retune(&mut self, fs: f64) {
        self.coeffs = BiquadCoeffs::design(self.kind, fs, self.corner_hz, self.q);
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Clear the running history.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Filter one value. An output that overflows clears the history and
    /// yields 0 so later input starts from a clean state.
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        if !y.is_finite() {
            log::debug!("{:?} biquad overflowed, state cleared", self.kind);
            self.reset();
            return 0.0;
        }
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Moving-average detrend followed by a high-pass/low-pass biquad pair.
///
/// Coefficients follow the sampling-rate estimate of every tick. They only
/// depend on the rounded rate, so they are rebuilt when that integer moves.
#[derive(Debug, Clone)]
pub struct FilterBank {
    cfg: FilterBankConfig,
    rate_hz: u32,
    highpass: Biquad,
    lowpass: Biquad,
}

impl FilterBank {
    pub fn new(cfg: FilterBankConfig, rate_hz: u32) -> Self {
        let fs = rate_hz as f64;
        Self {
            cfg,
            rate_hz,
            highpass: Biquad::new(BiquadKind::HighPass, fs, cfg.highpass_hz, cfg.q),
            lowpass: Biquad::new(BiquadKind::LowPass, fs, cfg.lowpass_hz, cfg.q),
        }
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Point both stages at the rate estimated for this tick.
    pub fn retune(&mut self, rate_hz: u32) {
        if rate_hz == self.rate_hz {
            return;
        }
        log::debug!("retuning filter bank {} Hz -> {} Hz", self.rate_hz, rate_hz);
        let fs = rate_hz as f64;
        self.highpass.retune(fs);
        self.lowpass.retune(fs);
        self.rate_hz = rate_hz;
    }

    /// Detrend window length in samples at the current rate.
    pub fn detrend_window(&self) -> usize {
        ((self.cfg.detrend_window_s * self.rate_hz as f64).round() as usize).max(5)
    }

    /// Filter one raw value. `history` holds the raw values of earlier ticks,
    /// oldest first; only its tail is read. The detrend mean covers `raw`
    /// itself, so the first tick enters the biquads as 0 instead of a step.
    pub fn process(&mut self, raw: f64, history: &VecDeque<f64>) -> f64 {
        let detrended = raw - trailing_mean(history, raw, self.detrend_window());
        let hp = self.highpass.process(detrended);
        self.lowpass.process(hp)
    }
}

/// Mean of `current` and up to `win - 1` values before it. Terms are scaled
/// before summing so finite input cannot overflow.
pub fn trailing_mean(history: &VecDeque<f64>, current: f64, win: usize) -> f64 {
    let n = win.saturating_sub(1).min(history.len()) + 1;
    let scale = n as f64;
    history
        .iter()
        .rev()
        .take(n - 1)
        .fold(current / scale, |acc, x| acc + x / scale)
}
