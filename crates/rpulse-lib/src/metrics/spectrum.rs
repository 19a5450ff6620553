use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Power over a linearly spaced frequency band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    pub frequencies: Vec<f64>,
    pub powers: Vec<f64>,
}

/// Heart rate and quality derived from a [`SpectrumResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralEstimate {
    pub dominant_hz: f64,
    pub heart_rate_bpm: f64,
    /// Peak power over the band median; `None` when the median is zero.
    pub quality_ratio: Option<f64>,
}

impl SpectrumResult {
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Index of the strongest bin. Ties keep the lowest frequency.
    pub fn dominant_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.powers.iter().enumerate() {
            match best {
                Some((_, bp)) if p <= bp => {}
                _ if !p.is_finite() => {}
                _ => best = Some((i, p)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn quality_ratio(&self) -> Option<f64> {
        let idx = self.dominant_index()?;
        let med = median(&self.powers)?;
        if med == 0.0 {
            return None;
        }
        let ratio = self.powers[idx] / med;
        ratio.is_finite().then_some(ratio)
    }

    pub fn estimate(&self) -> Option<SpectralEstimate> {
        let idx = self.dominant_index()?;
        let dominant_hz = self.frequencies[idx];
        Some(SpectralEstimate {
            dominant_hz,
            heart_rate_bpm: dominant_hz * 60.0,
            quality_ratio: self.quality_ratio(),
        })
    }
}

/// Narrow-band power spectrum of `segment` over `band` using one resonator
/// per bin. Cost is `bins * segment.len()`, with no length constraint.
pub fn spectrum(segment: &[f64], fs: f64, band: (f64, f64), bins: usize) -> SpectrumResult {
    let (f0, f1) = band;
    let step = if bins > 1 {
        (f1 - f0) / (bins - 1) as f64
    } else {
        0.0
    };
    let frequencies: Vec<f64> = (0..bins).map(|k| f0 + step * k as f64).collect();
    let powers = frequencies
        .iter()
        .map(|&f| resonator_power(segment, f, fs))
        .collect();
    SpectrumResult {
        frequencies,
        powers,
    }
}

/// Squared magnitude of the terminal in-phase/quadrature state of a
/// second-order resonator tuned to `freq`.
pub fn resonator_power(segment: &[f64], freq: f64, fs: f64) -> f64 {
    if segment.is_empty() || fs <= 0.0 {
        return 0.0;
    }
    let omega = 2.0 * PI * freq / fs;
    let (sin_w, cos_w) = omega.sin_cos();
    let coeff = 2.0 * cos_w;
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    for &x in segment {
        let s = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s;
    }
    let real = s1 - s2 * cos_w;
    let imag = s2 * sin_w;
    real * real + imag * imag
}

/// Median with the two middle values averaged for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Periodogram bins of a full real FFT that fall inside `band`.
///
/// Resolution is `fs / len`, so this is coarser than [`spectrum`] on short
/// windows; it is kept as an independent cross-check.
pub fn fft_spectrum(segment: &[f64], fs: f64, band: (f64, f64)) -> SpectrumResult {
    let n = segment.len();
    if n == 0 || fs <= 0.0 {
        return SpectrumResult::default();
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer = segment.to_vec();
    let mut output = fft.make_output_vec();
    if fft.process(&mut buffer, &mut output).is_err() {
        return SpectrumResult::default();
    }
    let mut result = SpectrumResult::default();
    for (k, c) in output.iter().enumerate() {
        let f = k as f64 * fs / n as f64;
        if f >= band.0 && f <= band.1 {
            result.frequencies.push(f);
            result.powers.push(c.norm_sqr());
        }
    }
    result
}
