//! Bloom-period detection on vegetation-index series
//!
//! A peak is a strict local maximum that also clears `mean + k * stddev` of
//! the whole series (population standard deviation). The first and last
//! positions are never peaks.

pub mod summary;

pub use summary::{BloomPeriod, TemporalSummary};

use std::collections::BTreeSet;

/// Default `k` in `mean + k * stddev`
pub const DEFAULT_RELATIVE_THRESHOLD: f64 = 0.1;

/// Stateless peak detector
#[derive(Debug, Clone, Copy)]
pub struct PeakDetector {
    relative_threshold: f64,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new(DEFAULT_RELATIVE_THRESHOLD)
    }
}

impl PeakDetector {
    pub fn new(relative_threshold: f64) -> Self {
        Self { relative_threshold }
    }

    pub fn relative_threshold(&self) -> f64 {
        self.relative_threshold
    }

    pub fn detect(&self, values: &[f64]) -> BTreeSet<usize> {
        detect(values, self.relative_threshold)
    }

    pub fn detect_optional(&self, values: &[Option<f64>]) -> BTreeSet<usize> {
        detect_optional(values, self.relative_threshold)
    }
}

/// Population mean and standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Indices of significant local maxima
pub fn detect(values: &[f64], relative_threshold: f64) -> BTreeSet<usize> {
    let mut peaks = BTreeSet::new();
    if values.len() < 3 {
        return peaks;
    }

    let (mean, std) = mean_std(values);
    let cutoff = mean + relative_threshold * std;

    for i in 1..values.len() - 1 {
        let v = values[i];
        if v > values[i - 1] && v > values[i + 1] && v > cutoff {
            peaks.insert(i);
        }
    }
    peaks
}

/// `detect` with unobserved values read as 0.0
pub fn detect_optional(values: &[Option<f64>], relative_threshold: f64) -> BTreeSet<usize> {
    let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(0.0)).collect();
    detect(&filled, relative_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[usize]) -> BTreeSet<usize> {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_monotonic_has_no_peaks() {
        assert_eq!(detect(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.1), set(&[]));
    }

    #[test]
    fn test_alternating_series() {
        assert_eq!(detect(&[1.0, 5.0, 1.0, 5.0, 1.0], 0.1), set(&[1, 3]));
    }

    #[test]
    fn test_constant_series_has_no_peaks() {
        assert_eq!(detect(&[3.0, 3.0, 3.0, 3.0, 3.0], 0.1), set(&[]));
    }

    #[test]
    fn test_ndvi_season() {
        // mean 0.35, std 0.15, cutoff 0.365; the last value is an endpoint
        let ndvi = [0.2, 0.3, 0.5, 0.3, 0.2, 0.6];
        assert_eq!(detect(&ndvi, 0.1), set(&[2]));
    }

    #[test]
    fn test_short_series() {
        assert!(detect(&[], 0.1).is_empty());
        assert!(detect(&[0.4], 0.1).is_empty());
        assert!(detect(&[0.1, 0.9], 0.1).is_empty());
    }

    #[test]
    fn test_plateau_is_not_a_peak() {
        assert!(detect(&[0.1, 0.5, 0.5, 0.1], 0.0).is_empty());
    }

    #[test]
    fn test_threshold_filters_small_bumps() {
        // both local maxima clear the mean; only the one at 4 clears mean + 1.5 * std
        let values = [0.1, 0.5, 0.4, 0.1, 0.9, 0.1];
        assert_eq!(detect(&values, 0.0), set(&[1, 4]));
        assert_eq!(detect(&values, 1.5), set(&[4]));
    }

    #[test]
    fn test_missing_values_read_as_zero() {
        let values = [Some(0.2), None, Some(0.6), Some(0.3), None];
        assert_eq!(detect_optional(&values, 0.1), set(&[2]));
    }

    #[test]
    fn test_detector_uses_configured_threshold() {
        let detector = PeakDetector::default();
        assert_eq!(detector.relative_threshold(), DEFAULT_RELATIVE_THRESHOLD);
        assert_eq!(detector.detect(&[1.0, 5.0, 1.0, 5.0, 1.0]), set(&[1, 3]));
    }
}
