//! Moving averages of the effect's frame timings.

use std::collections::VecDeque;

/// Number of samples each timing average covers.
pub const TIMING_WINDOW: usize = 32;

/// Fixed-window moving average.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: VecDeque<f64>,
    window: usize,
    sum: f64,
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(TIMING_WINDOW)
    }
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            sum: 0.0,
        }
    }

    /// Adds a sample, evicting the oldest one once the window is full.
    /// Non-finite samples are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    /// Average of the samples in the window, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

/// Averaged GPU and CPU batch timings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingReport {
    /// GPU time of the pass batch, `None` when the device has no timestamp queries.
    pub gpu_ms: Option<f64>,
    /// CPU time spent encoding the pass batch.
    pub batch_ms: f64,
}

/// The two timing averages the effect maintains.
#[derive(Debug, Clone, Default)]
pub struct FrameTimings {
    gpu: MovingAverage,
    batch: MovingAverage,
}

impl FrameTimings {
    pub fn record_gpu(&mut self, ms: f64) {
        self.gpu.push(ms);
    }

    pub fn record_batch(&mut self, ms: f64) {
        self.batch.push(ms);
    }

    pub fn report(&self) -> TimingReport {
        TimingReport {
            gpu_ms: (!self.gpu.is_empty()).then(|| self.gpu.average()),
            batch_ms: self.batch.average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_over_window() {
        let mut avg = MovingAverage::new(3);
        assert_eq!(avg.average(), 0.0);
        avg.push(1.0);
        avg.push(2.0);
        avg.push(3.0);
        assert!((avg.average() - 2.0).abs() < 1e-12);
        avg.push(7.0);
        assert_eq!(avg.len(), 3);
        assert!((avg.average() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_ignores_non_finite() {
        let mut avg = MovingAverage::default();
        avg.push(f64::NAN);
        avg.push(f64::INFINITY);
        assert!(avg.is_empty());
    }

    #[test]
    fn test_report_without_gpu_samples() {
        let mut timings = FrameTimings::default();
        timings.record_batch(0.5);
        let report = timings.report();
        assert_eq!(report.gpu_ms, None);
        assert!((report.batch_ms - 0.5).abs() < 1e-12);

        timings.record_gpu(1.25);
        assert_eq!(timings.report().gpu_ms, Some(1.25));
    }
}
