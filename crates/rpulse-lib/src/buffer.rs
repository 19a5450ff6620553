use crate::{
    clock::{MAX_RATE_HZ, MIN_RATE_HZ},
    signal::{InterBeatInterval, TimeSeries},
};
use std::collections::VecDeque;

/// Rate assumed for a suffix too short to measure.
pub const FALLBACK_RATE_HZ: f64 = 30.0;

/// Time-indexed ring of raw and filtered samples plus the rolling IBI set.
///
/// The three sample sequences always have the same length, timestamps are
/// strictly increasing, and after each append the span from head to tail is
/// at most `max_retention_s`.
#[derive(Debug, Clone)]
pub struct WindowedBuffer {
    max_retention_s: f64,
    max_ibi_count: usize,
    timestamps: VecDeque<f64>,
    raw: VecDeque<f64>,
    filtered: VecDeque<f64>,
    ibis: VecDeque<InterBeatInterval>,
}

impl WindowedBuffer {
    pub fn new(max_retention_s: f64, max_ibi_count: usize) -> Self {
        Self {
            max_retention_s,
            max_ibi_count,
            timestamps: VecDeque::new(),
            raw: VecDeque::new(),
            filtered: VecDeque::new(),
            ibis: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.back().copied()
    }

    /// Time between head and tail, 0 when fewer than two samples are held.
    pub fn span(&self) -> f64 {
        match (self.timestamps.front(), self.timestamps.back()) {
            (Some(head), Some(tail)) => tail - head,
            _ => 0.0,
        }
    }

    pub fn timestamps(&self) -> &VecDeque<f64> {
        &self.timestamps
    }

    pub fn raw_values(&self) -> &VecDeque<f64> {
        &self.raw
    }

    pub fn filtered_values(&self) -> &VecDeque<f64> {
        &self.filtered
    }

    pub fn intervals(&self) -> &VecDeque<InterBeatInterval> {
        &self.ibis
    }

    pub fn interval_seconds(&self) -> Vec<f64> {
        self.ibis.iter().map(|ibi| ibi.seconds).collect()
    }

    /// Append a tick and trim the head. The caller guarantees `timestamp`
    /// is later than [`Self::last_timestamp`].
    pub fn push(&mut self, timestamp: f64, raw: f64, filtered: f64) {
        debug_assert!(self.last_timestamp().map_or(true, |last| timestamp > last));
        self.timestamps.push_back(timestamp);
        self.raw.push_back(raw);
        self.filtered.push_back(filtered);
        self.trim();
    }

    fn trim(&mut self) {
        let Some(tail) = self.last_timestamp() else {
            return;
        };
        while self
            .timestamps
            .front()
            .is_some_and(|&t| tail - t > self.max_retention_s)
        {
            self.timestamps.pop_front();
            self.raw.pop_front();
            self.filtered.pop_front();
        }
        // The sample trim above already keeps the span within retention, so
        // interval history is aligned by age instead: every kept interval
        // ends inside the retained sample range.
        if let Some(&head) = self.timestamps.front() {
            while self.ibis.front().is_some_and(|ibi| ibi.ended_at < head) {
                self.ibis.pop_front();
            }
        }
    }

    /// Record an interval, evicting the oldest beyond the count cap.
    pub fn push_interval(&mut self, ibi: InterBeatInterval) {
        self.ibis.push_back(ibi);
        while self.ibis.len() > self.max_ibi_count {
            self.ibis.pop_front();
        }
    }

    /// Number of trailing samples whose timestamps span at most `window_s`.
    pub fn suffix_len(&self, window_s: f64) -> usize {
        let Some(tail) = self.last_timestamp() else {
            return 0;
        };
        self.timestamps
            .iter()
            .rev()
            .take_while(|&&t| tail - t <= window_s)
            .count()
    }

    /// Longest filtered suffix spanning at most `window_s`, with the rate
    /// implied by its own timestamps.
    pub fn filtered_segment(&self, window_s: f64) -> TimeSeries {
        let n = self.suffix_len(window_s);
        let start = self.len() - n;
        let data: Vec<f64> = self.filtered.range(start..).copied().collect();
        let fs = if n >= 2 {
            let span = self.timestamps[self.len() - 1] - self.timestamps[start];
            segment_rate(span, n)
        } else {
            FALLBACK_RATE_HZ
        };
        TimeSeries { fs, data }
    }
}

fn segment_rate(span: f64, count: usize) -> f64 {
    let dt = span / (count - 1) as f64;
    let fs = 1.0 / dt;
    if fs.is_finite() && fs > 0.0 {
        fs.clamp(MIN_RATE_HZ, MAX_RATE_HZ)
    } else {
        FALLBACK_RATE_HZ
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn span_never_exceeds_retention() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buf = WindowedBuffer::new(2.0, 20);
        let mut t = 0.0;
        for _ in 0..2_000 {
            t += rng.gen_range(0.001..0.3);
            buf.push(t, 1.0, 0.5);
            assert!(buf.span() <= 2.0);
            let ts = buf.timestamps();
            assert!(ts.iter().zip(ts.iter().skip(1)).all(|(a, b)| a < b));
            assert_eq!(buf.raw_values().len(), ts.len());
            assert_eq!(buf.filtered_values().len(), ts.len());
        }
    }

    #[test]
    fn segment_reports_its_own_rate() {
        let mut buf = WindowedBuffer::new(60.0, 20);
        for i in 0..300 {
            buf.push(i as f64 / 25.0, 0.0, i as f64);
        }
        let seg = buf.filtered_segment(4.02);
        assert_eq!(seg.len(), 101);
        assert!((seg.fs - 25.0).abs() < 1e-9);
        assert_eq!(seg.data.last().copied(), Some(299.0));
    }

    #[test]
    fn degenerate_segment_falls_back() {
        let mut buf = WindowedBuffer::new(60.0, 20);
        assert_eq!(buf.filtered_segment(12.0).fs, FALLBACK_RATE_HZ);
        buf.push(1.0, 0.0, 0.0);
        let seg = buf.filtered_segment(12.0);
        assert_eq!(seg.len(), 1);
        assert_eq!(seg.fs, FALLBACK_RATE_HZ);
    }

    #[test]
    fn segment_rate_is_clamped() {
        let mut buf = WindowedBuffer::new(60.0, 20);
        for i in 0..10 {
            buf.push(i as f64 * 0.001, 0.0, 0.0);
        }
        assert_eq!(buf.filtered_segment(12.0).fs, MAX_RATE_HZ);
    }

    #[test]
    fn intervals_capped_and_aged_out() {
        let mut buf = WindowedBuffer::new(5.0, 3);
        buf.push(0.0, 0.0, 0.0);
        for i in 1..=4 {
            buf.push_interval(InterBeatInterval {
                ended_at: i as f64 * 0.1,
                seconds: 0.8,
            });
        }
        assert_eq!(buf.intervals().len(), 3);
        assert_eq!(buf.intervals()[0].ended_at, 0.2);

        buf.push(5.25, 0.0, 0.0);
        assert_eq!(buf.intervals().len(), 0);
    }
}
