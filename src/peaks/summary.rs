//! Temporal summary of a vegetation series

use crate::features::record::FeatureSeries;
use crate::peaks::detect_optional;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomPeriod {
    pub date: NaiveDate,
    /// NDVI at the peak
    pub intensity: f64,
}

/// Bloom periods plus NDVI range statistics.
///
/// Statistics cover observed NDVI only; they are `None` when nothing was
/// observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalSummary {
    pub bloom_periods: Vec<BloomPeriod>,
    pub peak_count: usize,
    pub observations: usize,
    pub max_ndvi: Option<f64>,
    pub min_ndvi: Option<f64>,
    pub avg_ndvi: Option<f64>,
}

impl TemporalSummary {
    pub fn from_series(series: &FeatureSeries, relative_threshold: f64) -> Self {
        let ndvi = series.ndvi_values();
        let dates = series.dates();

        let bloom_periods: Vec<BloomPeriod> = detect_optional(&ndvi, relative_threshold)
            .into_iter()
            .map(|i| BloomPeriod {
                date: dates[i],
                intensity: ndvi[i].unwrap_or(0.0),
            })
            .collect();

        let observed: Vec<f64> = ndvi.iter().flatten().copied().collect();
        let (max_ndvi, min_ndvi, avg_ndvi) = if observed.is_empty() {
            (None, None, None)
        } else {
            let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
            let avg = observed.iter().sum::<f64>() / observed.len() as f64;
            (Some(max), Some(min), Some(avg))
        };

        Self {
            peak_count: bloom_periods.len(),
            bloom_periods,
            observations: series.len(),
            max_ndvi,
            min_ndvi,
            avg_ndvi,
        }
    }
}
