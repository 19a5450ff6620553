use serde::{Deserialize, Serialize};

/// Rectangle in frame-relative coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Fallback region used when no tracker result is available.
    pub fn centered() -> Self {
        Self::new(0.3, 0.3, 0.4, 0.4)
    }

    /// Pixel bounds `(x0, y0, x1, y1)`, exclusive at the far edge, after
    /// clamping to the unit square. `None` when nothing is left.
    pub fn pixel_bounds(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let coords = [self.x, self.y, self.width, self.height];
        if coords.iter().any(|c| !c.is_finite()) {
            return None;
        }
        let left = self.x.clamp(0.0, 1.0);
        let top = self.y.clamp(0.0, 1.0);
        let right = (self.x + self.width).clamp(0.0, 1.0);
        let bottom = (self.y + self.height).clamp(0.0, 1.0);
        let x0 = (left * width as f64).floor() as usize;
        let y0 = (top * height as f64).floor() as usize;
        let x1 = ((right * width as f64).ceil() as usize).min(width);
        let y1 = ((bottom * height as f64).ceil() as usize).min(height);
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }
}

/// Single-channel 8-bit frame, row-major.
#[derive(Debug, Clone)]
pub struct LumaFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    /// Mean brightness inside `region`, or `None` for an empty crop or a
    /// frame whose pixel buffer is too short.
    pub fn mean_brightness(&self, region: &NormalizedRect) -> Option<f64> {
        if self.pixels.len() < self.width * self.height {
            return None;
        }
        let (x0, y0, x1, y1) = region.pixel_bounds(self.width, self.height)?;
        let mut sum = 0u64;
        for row in y0..y1 {
            let start = row * self.width;
            sum += self.pixels[start + x0..start + x1]
                .iter()
                .map(|&p| p as u64)
                .sum::<u64>();
        }
        let count = (x1 - x0) * (y1 - y0);
        Some(sum as f64 / count as f64)
    }
}

/// Supplies the region to average for the current frame.
pub trait RegionTracker {
    fn current_region(&mut self) -> Option<NormalizedRect>;
}

/// Tracker that always reports the same rectangle.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion(pub NormalizedRect);

impl RegionTracker for FixedRegion {
    fn current_region(&mut self) -> Option<NormalizedRect> {
        Some(self.0)
    }
}

/// No tracking at all; callers fall back to [`NormalizedRect::centered`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracker;

impl RegionTracker for NoTracker {
    fn current_region(&mut self) -> Option<NormalizedRect> {
        None
    }
}
