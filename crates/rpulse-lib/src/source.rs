use crate::{
    roi::{LumaFrame, NormalizedRect, RegionTracker},
    signal::Sample,
};
use anyhow::Result;
use rand::Rng;
use std::{collections::VecDeque, f64::consts::PI};

/// Anything that can hand the pipeline one brightness sample per tick.
pub trait FrameSource {
    /// Next sample, or `None` at end of stream.
    fn next_sample(&mut self) -> Result<Option<Sample>>;
}

/// Replays a recorded sequence of samples.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<Sample>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        Ok(self.samples.pop_front())
    }
}

/// Parameters of the demo signal generator.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    pub bpm: f64,
    pub fps: f64,
    pub duration_s: f64,
    /// Mean brightness level.
    pub base_level: f64,
    /// Pulse amplitude in brightness units.
    pub amplitude: f64,
    /// Peak additive noise.
    pub noise: f64,
    /// Slow lighting drift (brightness units per second).
    pub drift_per_s: f64,
    /// Relative frame-time jitter, 0 for a perfect clock.
    pub frame_jitter: f64,
    /// Relative beat-to-beat period variation.
    pub beat_jitter: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bpm: 72.0,
            fps: 30.0,
            duration_s: 60.0,
            base_level: 120.0,
            amplitude: 1.0,
            noise: 0.1,
            drift_per_s: 0.05,
            frame_jitter: 0.1,
            beat_jitter: 0.03,
        }
    }
}

/// Demo-mode source: a pulse wave with noise, drift and timing jitter drawn
/// from the injected RNG. A seeded RNG gives a reproducible stream.
#[derive(Debug, Clone)]
pub struct SyntheticSource<R> {
    cfg: SyntheticConfig,
    rng: R,
    t: f64,
    phase: f64,
    beat_period: f64,
    emitted: usize,
}

impl<R: Rng> SyntheticSource<R> {
    pub fn new(cfg: SyntheticConfig, mut rng: R) -> Self {
        let beat_period = next_beat_period(&cfg, &mut rng);
        Self {
            cfg,
            rng,
            t: 0.0,
            phase: 0.0,
            beat_period,
            emitted: 0,
        }
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        if scale > 0.0 {
            self.rng.gen_range(-scale..scale)
        } else {
            0.0
        }
    }
}

fn next_beat_period<R: Rng>(cfg: &SyntheticConfig, rng: &mut R) -> f64 {
    let nominal = 60.0 / cfg.bpm.max(1.0);
    if cfg.beat_jitter > 0.0 {
        nominal * (1.0 + rng.gen_range(-cfg.beat_jitter..cfg.beat_jitter))
    } else {
        nominal
    }
}

impl<R: Rng> FrameSource for SyntheticSource<R> {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        let frame_dt = 1.0 / self.cfg.fps.max(1.0);
        let dt = frame_dt * (1.0 + self.jitter(self.cfg.frame_jitter)).max(0.1);
        if self.emitted > 0 && self.t + dt > self.cfg.duration_s {
            return Ok(None);
        }
        if self.emitted > 0 {
            self.t += dt;
            self.phase += dt / self.beat_period;
            while self.phase >= 1.0 {
                self.phase -= 1.0;
                self.beat_period = next_beat_period(&self.cfg, &mut self.rng);
            }
        }
        self.emitted += 1;
        let pulse = (2.0 * PI * self.phase).sin();
        let noise = self.jitter(self.cfg.noise);
        let value = self.cfg.base_level
            + self.cfg.drift_per_s * self.t
            + self.cfg.amplitude * pulse
            + noise;
        Ok(Some(Sample::new(self.t, value)))
    }
}

/// Turns timestamped frames into samples by averaging the tracked region.
/// Frames whose crop is empty are skipped.
pub struct FrameBrightnessSource<F, T> {
    frames: F,
    tracker: T,
}

impl<F, T> FrameBrightnessSource<F, T>
where
    F: Iterator<Item = (f64, LumaFrame)>,
    T: RegionTracker,
{
    pub fn new(frames: F, tracker: T) -> Self {
        Self { frames, tracker }
    }
}

impl<F, T> FrameSource for FrameBrightnessSource<F, T>
where
    F: Iterator<Item = (f64, LumaFrame)>,
    T: RegionTracker,
{
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        for (timestamp, frame) in self.frames.by_ref() {
            let region = self
                .tracker
                .current_region()
                .unwrap_or_else(NormalizedRect::centered);
            match frame.mean_brightness(&region) {
                Some(value) => return Ok(Some(Sample::new(timestamp, value))),
                None => log::debug!("empty region at {timestamp:.3}s, frame skipped"),
            }
        }
        Ok(None)
    }
}
