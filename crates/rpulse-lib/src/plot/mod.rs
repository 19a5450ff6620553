//! Backend-agnostic figures for the filtered waveform and the band spectrum.

use crate::{metrics::spectrum::SpectrumResult, signal::TimeSeries};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

impl Axis {
    fn labelled(label: &str) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<LineSeries>,
    /// Vertical marker, e.g. the dominant frequency.
    pub marker_x: Option<f64>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
            marker_x: None,
        }
    }

    pub fn add_series(&mut self, series: LineSeries) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all points, or `None` if empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    (0..max_points)
        .map(|i| (i as f64 * bucket_size).floor() as usize)
        .take_while(|&start| start < points.len())
        .map(|start| points[start])
        .collect()
}

/// Filtered waveform against seconds from the start of the segment.
pub fn figure_from_waveform(segment: &TimeSeries, max_points: usize) -> Figure {
    let dt = 1.0 / segment.fs.max(1.0);
    let points: Vec<[f64; 2]> = segment
        .data
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect();
    let mut fig = Figure::new(Some("Filtered pulse waveform".to_string()));
    fig.x = Axis::labelled("time (s)");
    fig.y = Axis::labelled("filtered brightness");
    fig.add_series(LineSeries {
        name: "waveform".into(),
        points: decimate_points(&points, max_points),
        width: 1.4,
        color: Color(0x1F77B4),
    });
    fig
}

/// Band power against beats per minute, marking the dominant bin.
pub fn figure_from_spectrum(spectrum: &SpectrumResult) -> Figure {
    let points = spectrum
        .frequencies
        .iter()
        .zip(&spectrum.powers)
        .map(|(f, p)| [f * 60.0, *p])
        .collect();
    let mut fig = Figure::new(Some("Pulse band spectrum".to_string()));
    fig.x = Axis::labelled("bpm");
    fig.y = Axis::labelled("power");
    fig.marker_x = spectrum
        .estimate()
        .map(|estimate| estimate.heart_rate_bpm);
    fig.add_series(LineSeries {
        name: "power".into(),
        points,
        width: 2.0,
        color: Color(0xFF0077),
    });
    fig
}
