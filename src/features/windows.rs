//! Trailing-window sums for precipitation and evapotranspiration
//!
//! A window covers `[t - N days, t)`: the observation date itself is excluded,
//! matching how the acquisition layer filters collections by date. A window
//! with no observed value is `None`, never zero.

use crate::data::EnvironmentalSample;
use crate::features::record::WINDOW_DAYS;
use chrono::{Duration, NaiveDate};

/// One optional sum per entry of `WINDOW_DAYS`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowSums {
    sums: [Option<f64>; 5],
}

impl WindowSums {
    /// All windows unavailable
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Sums in `WINDOW_DAYS` order (7, 15, 30, 60, 90)
    pub fn new(sums: [Option<f64>; 5]) -> Self {
        Self { sums }
    }

    /// Sum `band` over each trailing window ending at `t`
    pub fn from_samples(t: NaiveDate, samples: &[EnvironmentalSample], band: &str) -> Self {
        let mut sums = [None; 5];
        for (slot, days) in sums.iter_mut().zip(WINDOW_DAYS) {
            let start = t - Duration::days(days as i64);
            *slot = samples
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp < t)
                .filter_map(|s| s.band(band))
                .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));
        }
        Self { sums }
    }

    /// Sum for a window size; `None` for sizes outside `WINDOW_DAYS`
    pub fn get(&self, days: u32) -> Option<f64> {
        WINDOW_DAYS
            .iter()
            .position(|&d| d == days)
            .and_then(|i| self.sums[i])
    }

    pub fn as_array(&self) -> [Option<f64>; 5] {
        self.sums
    }

    /// Element-wise `self - other`; `None` wherever either side is `None`
    pub fn minus(&self, other: &WindowSums) -> [Option<f64>; 5] {
        let mut out = [None; 5];
        for i in 0..5 {
            out[i] = match (self.sums[i], other.sums[i]) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            };
        }
        out
    }
}
