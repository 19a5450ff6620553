use crate::{
    buffer::WindowedBuffer,
    clock::SamplingClock,
    detectors::ppg::{PeakDetector, PeakDetectorConfig},
    error::PipelineError,
    filters::{FilterBank, FilterBankConfig},
    metrics::{
        focus::focus_score,
        hrv::rmssd,
        spectrum::spectrum,
    },
    signal::{InterBeatInterval, Sample},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, path::Path};

pub use crate::metrics::focus::Baseline;

/// Tunables of the estimation pipeline. Missing fields in a TOML file keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_retention_seconds: f64,
    pub spectral_band_hz: (f64, f64),
    pub spectral_bins: usize,
    pub analysis_window_seconds: f64,
    pub peak_window_seconds: f64,
    pub refractory_period_seconds: f64,
    pub max_ibi_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retention_seconds: 60.0,
            spectral_band_hz: (0.7, 3.0),
            spectral_bins: 120,
            analysis_window_seconds: 12.0,
            peak_window_seconds: 5.0,
            refractory_period_seconds: 0.333,
            max_ibi_count: 20,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(text).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let finite = [
            self.max_retention_seconds,
            self.spectral_band_hz.0,
            self.spectral_band_hz.1,
            self.analysis_window_seconds,
            self.peak_window_seconds,
            self.refractory_period_seconds,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::config("all durations and frequencies must be finite"));
        }
        if self.max_retention_seconds <= 0.0 {
            return Err(PipelineError::config("max_retention_seconds must be positive"));
        }
        let (f0, f1) = self.spectral_band_hz;
        if f0 >= f1 {
            return Err(PipelineError::config(format!(
                "spectral band {f0}..{f1} Hz is empty"
            )));
        }
        if f0 <= 0.0 {
            return Err(PipelineError::config("spectral band must start above 0 Hz"));
        }
        if self.spectral_bins < 2 {
            return Err(PipelineError::config("spectral_bins must be at least 2"));
        }
        if self.analysis_window_seconds <= 0.0 || self.peak_window_seconds <= 0.0 {
            return Err(PipelineError::config("analysis and peak windows must be positive"));
        }
        if self.refractory_period_seconds < 0.0 {
            return Err(PipelineError::config("refractory_period_seconds must not be negative"));
        }
        if self.max_ibi_count == 0 {
            return Err(PipelineError::config("max_ibi_count must be at least 1"));
        }
        Ok(())
    }
}

/// Everything a presentation layer needs after one tick. Absent fields were
/// not computable on this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickOutputs {
    pub heart_rate_bpm: Option<u32>,
    pub quality_ratio: Option<f64>,
    pub rmssd_ms: Option<u32>,
    /// Experimental heuristic, see [`crate::metrics::focus`].
    pub focus_score: Option<u8>,
    pub filtered_waveform_segment: Vec<f64>,
}

/// Owns all per-subject state; one [`Pipeline::push_tick`] per frame.
#[derive(Debug, Clone)]
pub struct Pipeline {
    cfg: PipelineConfig,
    clock: SamplingClock,
    filters: FilterBank,
    buffer: WindowedBuffer,
    peaks: PeakDetector,
    baseline: Baseline,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let clock = SamplingClock::new();
        let filters = FilterBank::new(FilterBankConfig::default(), clock.rate_hz());
        let buffer = WindowedBuffer::new(cfg.max_retention_seconds, cfg.max_ibi_count);
        let peaks = PeakDetector::new(PeakDetectorConfig {
            window_s: cfg.peak_window_seconds,
            refractory_s: cfg.refractory_period_seconds,
            ..PeakDetectorConfig::default()
        });
        Ok(Self {
            cfg,
            clock,
            filters,
            buffer,
            peaks,
            baseline: Baseline::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn set_baseline(&mut self, heart_rate_bpm: f64, rmssd_ms: f64) {
        self.baseline = Baseline {
            heart_rate_bpm,
            rmssd_ms,
        };
    }

    /// Rounded rate used by the filter bank on the latest tick.
    pub fn sampling_rate(&self) -> u32 {
        self.filters.rate_hz()
    }

    pub fn buffer(&self) -> &WindowedBuffer {
        &self.buffer
    }

    pub fn intervals(&self) -> &VecDeque<InterBeatInterval> {
        self.buffer.intervals()
    }

    pub fn push_sample(&mut self, sample: Sample) -> Result<TickOutputs, PipelineError> {
        self.push_tick(sample.timestamp, sample.value)
    }

    /// Run one full step. A rejected tick leaves every piece of state as it was.
    pub fn push_tick(&mut self, timestamp: f64, raw: f64) -> Result<TickOutputs, PipelineError> {
        if !timestamp.is_finite() || !raw.is_finite() {
            return Err(PipelineError::NonFiniteSample {
                timestamp,
                value: raw,
            });
        }
        if let Some(previous) = self.buffer.last_timestamp() {
            if timestamp <= previous {
                return Err(PipelineError::OutOfOrderTick {
                    previous,
                    received: timestamp,
                });
            }
        }

        let rate = self.clock.tick(timestamp);
        self.filters.retune(rate);
        let filtered = self.filters.process(raw, self.buffer.raw_values());
        self.buffer.push(timestamp, raw, filtered);

        if let Some(ibi) = self.peaks.update(&self.buffer) {
            self.buffer.push_interval(ibi);
        }

        let segment = self.buffer.filtered_segment(self.cfg.analysis_window_seconds);
        let estimate = if segment.len() as f64 > 4.0 * segment.fs {
            spectrum(
                &segment.data,
                segment.fs,
                self.cfg.spectral_band_hz,
                self.cfg.spectral_bins,
            )
            .estimate()
        } else {
            None
        };

        let heart_rate_bpm = estimate.map(|e| e.heart_rate_bpm.round() as u32);
        let rmssd_ms = rmssd(&self.buffer.interval_seconds()).map(|v| v.round() as u32);
        let focus = match (heart_rate_bpm, rmssd_ms) {
            (Some(hr), Some(rm)) => Some(focus_score(hr as f64, rm as f64, &self.baseline)),
            _ => None,
        };

        Ok(TickOutputs {
            heart_rate_bpm,
            quality_ratio: estimate.and_then(|e| e.quality_ratio),
            rmssd_ms,
            focus_score: focus,
            filtered_waveform_segment: segment.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn run(pipeline: &mut Pipeline, bpm: f64, fs: f64, seconds: f64) -> TickOutputs {
        let mut rng = StdRng::seed_from_u64(21);
        let mut last = TickOutputs::default();
        let n = (fs * seconds) as usize;
        for i in 1..=n {
            let t = i as f64 / fs;
            let pulse = (2.0 * PI * bpm / 60.0 * t).sin();
            let raw = 120.0 + 0.5 * t + pulse + rng.gen_range(-0.02..0.02);
            last = pipeline.push_tick(t, raw).expect("tick accepted");
        }
        last
    }

    #[test]
    fn estimates_heart_rate_and_hrv() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        let out = run(&mut p, 72.0, 30.0, 30.0);
        let hr = out.heart_rate_bpm.expect("heart rate");
        assert!((hr as f64 - 72.0).abs() <= 3.0, "hr {hr}");
        assert!(out.quality_ratio.expect("quality") > 1.0);
        assert!(out.rmssd_ms.is_some());
        let focus = out.focus_score.expect("focus");
        assert!(focus <= 100);
        assert_eq!(p.sampling_rate(), 30);
        assert!(p.intervals().len() <= 20);
        for ibi in p.intervals() {
            assert!((ibi.seconds - 60.0 / 72.0).abs() < 0.1, "ibi {}", ibi.seconds);
        }
    }

    fn clean_tick(t: f64, bpm: f64) -> f64 {
        120.0 + (2.0 * PI * bpm / 60.0 * t).sin()
    }

    #[test]
    fn first_interval_matches_pulse_period() {
        for bpm in [66.0, 72.0, 80.0] {
            let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
            let mut first = None;
            for i in 0..300 {
                let t = i as f64 / 30.0;
                p.push_tick(t, clean_tick(t, bpm)).unwrap();
                if first.is_none() {
                    first = p.intervals().front().map(|ibi| ibi.seconds);
                }
            }
            let first = first.expect("an interval within 10 s");
            assert!(
                (first - 60.0 / bpm).abs() < 0.1,
                "{bpm} bpm: first interval {first}"
            );
        }
    }

    #[test]
    fn extreme_ticks_do_not_poison_outputs() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut t = 0.0;
        for i in 0..1_000 {
            t += 1.0 / 30.0;
            let raw = if (30..33).contains(&i) {
                1.5e308
            } else {
                clean_tick(t, 72.0)
            };
            let out = p.push_tick(t, raw).unwrap();
            assert!(out.filtered_waveform_segment.iter().all(|v| v.is_finite()));
            assert!(out.quality_ratio.map_or(true, f64::is_finite));
        }
    }

    #[test]
    fn retunes_when_tick_spacing_changes() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut t = 0.0;
        for _ in 0..300 {
            t += 1.0 / 30.0;
            p.push_tick(t, clean_tick(t, 72.0)).unwrap();
        }
        assert_eq!(p.sampling_rate(), 30);

        let mut previous = *p.buffer().filtered_values().back().unwrap();
        let mut last = TickOutputs::default();
        for _ in 0..300 {
            t += 1.0 / 15.0;
            last = p.push_tick(t, clean_tick(t, 72.0)).unwrap();
            let current = *p.buffer().filtered_values().back().unwrap();
            assert!(current.is_finite() && current.abs() < 4.0, "filtered {current}");
            assert!((current - previous).abs() < 2.5, "jump {previous} -> {current}");
            previous = current;
        }
        assert_eq!(p.sampling_rate(), 15);
        let hr = last.heart_rate_bpm.expect("heart rate");
        assert!((hr as f64 - 72.0).abs() <= 4.0, "hr {hr}");
    }

    #[test]
    fn spectrum_waits_for_more_than_four_seconds_of_samples() {
        // 16 Hz ticks keep the measured segment rate exact.
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut out = TickOutputs::default();
        for i in 0..64 {
            let t = i as f64 * 0.0625;
            out = p.push_tick(t, clean_tick(t, 72.0)).unwrap();
        }
        assert_eq!(out.filtered_waveform_segment.len(), 64);
        assert_eq!(out.heart_rate_bpm, None);
        assert_eq!(out.quality_ratio, None);

        let out = p.push_tick(64.0 * 0.0625, clean_tick(4.0, 72.0)).unwrap();
        assert!(out.heart_rate_bpm.is_some());
    }

    #[test]
    fn early_ticks_have_no_estimates() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        let out = run(&mut p, 72.0, 30.0, 2.0);
        assert_eq!(out.heart_rate_bpm, None);
        assert_eq!(out.quality_ratio, None);
        assert_eq!(out.focus_score, None);
        assert_eq!(out.filtered_waveform_segment.len(), 60);
    }

    #[test]
    fn rejects_out_of_order_ticks_without_side_effects() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.push_tick(1.0, 10.0).unwrap();
        p.push_tick(1.1, 11.0).unwrap();
        let len = p.buffer().len();
        let err = p.push_tick(1.1, 12.0).unwrap_err();
        assert_eq!(
            err,
            PipelineError::OutOfOrderTick {
                previous: 1.1,
                received: 1.1
            }
        );
        assert!(p.push_tick(0.5, 12.0).is_err());
        assert_eq!(p.buffer().len(), len);
        assert_eq!(p.buffer().last_timestamp(), Some(1.1));
    }

    #[test]
    fn rejects_non_finite_samples() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        assert!(matches!(
            p.push_tick(1.0, f64::NAN),
            Err(PipelineError::NonFiniteSample { .. })
        ));
        assert!(p.buffer().is_empty());
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        let bad = [
            PipelineConfig {
                max_retention_seconds: 0.0,
                ..Default::default()
            },
            PipelineConfig {
                spectral_band_hz: (3.0, 0.7),
                ..Default::default()
            },
            PipelineConfig {
                spectral_band_hz: (1.0, 1.0),
                ..Default::default()
            },
            PipelineConfig {
                spectral_bins: 1,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(
                Pipeline::new(cfg),
                Err(PipelineError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            "max_retention_seconds = 30.0\nspectral_band_hz = [0.8, 2.5]\n",
        )
        .unwrap();
        assert_eq!(cfg.max_retention_seconds, 30.0);
        assert_eq!(cfg.spectral_band_hz, (0.8, 2.5));
        assert_eq!(cfg.spectral_bins, 120);
        assert!(PipelineConfig::from_toml_str("spectral_bins = 1").is_err());
    }

    #[test]
    fn retention_bounds_buffer_span() {
        let cfg = PipelineConfig {
            max_retention_seconds: 8.0,
            ..Default::default()
        };
        let mut p = Pipeline::new(cfg).unwrap();
        run(&mut p, 66.0, 30.0, 20.0);
        assert!(p.buffer().span() <= 8.0);
    }

    #[test]
    fn baseline_shifts_focus() {
        let mut a = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut b = Pipeline::new(PipelineConfig::default()).unwrap();
        b.set_baseline(100.0, 40.0);
        let fa = run(&mut a, 80.0, 30.0, 20.0).focus_score.expect("focus a");
        let fb = run(&mut b, 80.0, 30.0, 20.0).focus_score.expect("focus b");
        assert!(fb < fa, "{fb} should be below {fa}");
        assert_eq!(b.baseline().heart_rate_bpm, 100.0);
    }

    #[test]
    fn identical_input_is_reproducible() {
        let mut a = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut b = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(run(&mut a, 75.0, 24.0, 15.0), run(&mut b, 75.0, 24.0, 15.0));
    }
}
