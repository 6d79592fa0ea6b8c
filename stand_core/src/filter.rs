//! Sliding-window moving average over the last `FILTER_WINDOW` samples.

/// Number of samples averaged into the filtered force.
pub const FILTER_WINDOW: usize = 50;

/// Fixed ring buffer plus running sum; O(1) per push.
///
/// The sum is kept in `f64` and rebuilt from the buffer each time the write
/// head wraps, so add/subtract drift cannot accumulate over a long run.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    buf: Box<[f32]>,
    head: usize,
    count: usize,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            buf: vec![0.0; window.max(1)].into_boxed_slice(),
            head: 0,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn window(&self) -> usize {
        self.buf.len()
    }

    /// Samples currently contributing, `min(pushed, window)`.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add a sample and return the new average.
    pub fn push(&mut self, v: f32) -> f32 {
        let w = self.buf.len();
        if self.count == w {
            self.sum -= f64::from(self.buf[self.head]);
        } else {
            self.count += 1;
        }
        self.buf[self.head] = v;
        self.sum += f64::from(v);
        self.head += 1;
        if self.head == w {
            self.head = 0;
            self.sum = self.buf.iter().map(|&x| f64::from(x)).sum();
        }
        self.average()
    }

    /// Zero before the first sample.
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f64) as f32
        }
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(FILTER_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn steady_input_averages_exactly() {
        let mut ma = MovingAverage::default();
        let v = 123.25_f32;
        let mut out = 0.0;
        for _ in 0..FILTER_WINDOW {
            out = ma.push(v);
        }
        assert_eq!(out, v);
        let next = ma.push(2.0 * v);
        let expected = (49.0 * v + 2.0 * v) / 50.0;
        assert!((next - expected).abs() < 1e-4, "{next} vs {expected}");
    }

    #[test]
    fn partial_window_uses_sample_count() {
        let mut ma = MovingAverage::new(50);
        assert_eq!(ma.average(), 0.0);
        ma.push(10.0);
        ma.push(20.0);
        assert_eq!(ma.len(), 2);
        assert_eq!(ma.average(), 15.0);
    }

    #[test]
    fn zero_window_is_treated_as_one() {
        let mut ma = MovingAverage::new(0);
        assert_eq!(ma.window(), 1);
        ma.push(3.0);
        assert_eq!(ma.push(7.0), 7.0);
    }

    proptest! {
        #[test]
        fn average_matches_last_window(
            xs in proptest::collection::vec(-5000.0f32..5000.0, 1..400),
            window in 1usize..64,
        ) {
            let mut ma = MovingAverage::new(window);
            let mut last = 0.0;
            for &x in &xs {
                last = ma.push(x);
            }
            let tail = &xs[xs.len().saturating_sub(window)..];
            let expected = tail.iter().map(|&x| f64::from(x)).sum::<f64>() / tail.len() as f64;
            prop_assert!((f64::from(last) - expected).abs() < 1e-2);
            prop_assert_eq!(ma.len(), xs.len().min(window));
        }
    }
}
