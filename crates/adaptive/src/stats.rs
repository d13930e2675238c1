//! Fixed-capacity frame-time history and the statistics the controller
//! decides on.

/// Ring capacity; a power of two so the write index wraps with a mask.
pub(crate) const HISTORY_CAPACITY: usize = 64;

/// Ring buffer of recent frame times, in seconds.
#[derive(Debug, Clone)]
pub(crate) struct FrameHistory {
    samples: [f32; HISTORY_CAPACITY],
    head: usize,
    len: usize,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self {
            samples: [0.0; HISTORY_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, seconds: f32) {
        self.samples[self.head] = seconds;
        self.head = (self.head + 1) & (HISTORY_CAPACITY - 1);
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let start = (self.head + HISTORY_CAPACITY - self.len) & (HISTORY_CAPACITY - 1);
        (0..self.len).map(move |offset| self.samples[(start + offset) & (HISTORY_CAPACITY - 1)])
    }

    pub fn mean(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        Some(self.iter().sum::<f32>() / self.len as f32)
    }

    pub fn stddev(&self) -> Option<f32> {
        let mean = self.mean()?;
        if self.len < 2 {
            return Some(0.0);
        }
        let variance =
            self.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / self.len as f32;
        Some(variance.sqrt())
    }

    /// Percentile over the history with outliers beyond `spike_sigma`
    /// standard deviations from the mean excluded first, so a one-off hitch
    /// cannot masquerade as sustained load.
    pub fn percentile_filtered(&self, percentile: f32, spike_sigma: f32) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let mean = self.mean()?;
        let stddev = self.stddev()?;
        let mut filtered: Vec<f32> = if stddev > f32::EPSILON {
            let limit = spike_sigma * stddev;
            self.iter().filter(|x| (x - mean).abs() <= limit).collect()
        } else {
            self.iter().collect()
        };
        if filtered.is_empty() {
            // Every sample was an outlier relative to itself; fall back to
            // the raw history.
            filtered = self.iter().collect();
        }
        filtered.sort_by(|a, b| a.total_cmp(b));
        let rank = ((filtered.len() - 1) as f32 * percentile.clamp(0.0, 1.0)).round() as usize;
        Some(filtered[rank])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[f32]) -> FrameHistory {
        let mut history = FrameHistory::new();
        for &value in values {
            history.push(value);
        }
        history
    }

    #[test]
    fn mean_and_stddev_of_constant_series() {
        let history = filled(&[0.016; 32]);
        assert!((history.mean().unwrap() - 0.016).abs() < 1e-6);
        assert!(history.stddev().unwrap() < 1e-6);
    }

    #[test]
    fn ring_discards_oldest_samples() {
        let mut history = FrameHistory::new();
        for _ in 0..HISTORY_CAPACITY {
            history.push(1.0);
        }
        for _ in 0..HISTORY_CAPACITY {
            history.push(2.0);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!((history.mean().unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn percentile_picks_upper_tail() {
        let mut values = Vec::new();
        for i in 0..50 {
            values.push(0.010 + i as f32 * 0.0001);
        }
        let history = filled(&values);
        let p50 = history.percentile_filtered(0.50, 10.0).unwrap();
        let p95 = history.percentile_filtered(0.95, 10.0).unwrap();
        assert!(p95 > p50);
    }

    #[test]
    fn spike_is_excluded_from_percentile() {
        let mut values = vec![0.016; 40];
        values.push(0.250);
        let history = filled(&values);
        let p99 = history.percentile_filtered(0.99, 3.0).unwrap();
        assert!(
            p99 < 0.020,
            "a single 250ms hitch should not drive the decision time, got {p99}"
        );
    }

    #[test]
    fn empty_history_yields_nothing() {
        let history = FrameHistory::new();
        assert!(history.mean().is_none());
        assert!(history.percentile_filtered(0.95, 3.0).is_none());
    }
}
