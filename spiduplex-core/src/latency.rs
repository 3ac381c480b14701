//! Latency Accumulator
//!
//! Owned by the master actor alone; the orchestrator reads it only after the
//! master thread has been joined, so there is no locking.

use spiduplex_report::LatencySummary;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LatencyAccumulator {
    divisor: u64,
    average_us: f64,
    samples: u64,
}

impl LatencyAccumulator {
    /// `divisor` is the configured transaction count `N`. A run of `N`
    /// transactions performs `N - 1` exchanges, so a full run reports
    /// `(N - 1) / N` of the true per-exchange mean.
    pub fn new(divisor: u64) -> Self {
        Self {
            divisor: divisor.max(1),
            average_us: 0.0,
            samples: 0,
        }
    }

    /// `avg += delta / N`
    pub fn add(&mut self, delta: Duration) {
        self.average_us += delta.as_secs_f64() * 1_000_000.0 / self.divisor as f64;
        self.samples += 1;
    }

    pub fn average_us(&self) -> f64 {
        self.average_us
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            average_us: self.average_us,
            samples: self.samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator() {
        let acc = LatencyAccumulator::new(10);
        assert_eq!(acc.average_us(), 0.0);
        assert_eq!(acc.samples(), 0);
    }

    #[test]
    fn test_sum_over_n() {
        let n = 10;
        let durations_us = [5u64, 7, 11, 13, 17, 19, 23, 29, 31];
        let mut acc = LatencyAccumulator::new(n);

        for d in durations_us {
            acc.add(Duration::from_micros(d));
        }

        let expected = durations_us.iter().sum::<u64>() as f64 / n as f64;
        assert!((acc.average_us() - expected).abs() < 1e-9);
        assert_eq!(acc.samples(), durations_us.len() as u64);
    }

    #[test]
    fn test_sub_microsecond_precision() {
        let mut acc = LatencyAccumulator::new(4);
        acc.add(Duration::from_nanos(500));
        assert!((acc.average_us() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_zero_divisor_clamped() {
        let mut acc = LatencyAccumulator::new(0);
        acc.add(Duration::from_micros(3));
        assert!((acc.average_us() - 3.0).abs() < 1e-12);
    }
}
