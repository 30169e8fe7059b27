//! Time-series feature builder
//!
//! Turns the aligned per-date inputs (one vegetation composite, one LST
//! composite, trailing precipitation/ET sums) into a `FeatureRecord`. The only
//! state is the NDVI history the caller threads across consecutive calls, which
//! is what makes `NDVI_change` and the rolling mean lag features without
//! look-ahead.

use crate::data::{bands, EnvironmentalSample};
use crate::error::{BloomError, BloomResult};
use crate::features::calendar::{CalendarFeatures, Hemisphere};
use crate::features::record::FeatureRecord;
use crate::features::windows::WindowSums;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Daytime LST (Kelvin) above which a composite is flagged as thermal stress.
///
/// Fixed policy: the categorical feature the model was trained on is defined
/// by exactly this cut-off, so it is not configurable.
pub const THERMAL_STRESS_LST_KELVIN: f64 = 305.0;

/// How `NDVI_rolling_mean_30d` is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingPolicy {
    /// Mean over the last `n` records regardless of spacing. Unobserved NDVI
    /// counts as 0 and the current value is returned until more than `n`
    /// records exist. `LastRecords(2)` reproduces the feature definition the
    /// shipped model was trained on.
    LastRecords(usize),
    /// Mean of observed NDVI inside a trailing window of `days`. When fewer
    /// than `min_samples` observations fall in the window, the most recent
    /// `min_samples` observations are averaged instead.
    ElapsedDays { days: i64, min_samples: usize },
}

impl Default for RollingPolicy {
    fn default() -> Self {
        RollingPolicy::LastRecords(2)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub rolling: RollingPolicy,
    pub hemisphere: Hemisphere,
}

/// Inputs aligned on one observation date
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildInputs<'a> {
    pub vegetation: Option<&'a EnvironmentalSample>,
    pub lst: Option<&'a EnvironmentalSample>,
    pub et_composite: Option<&'a EnvironmentalSample>,
    pub precip_sums: WindowSums,
    pub et_sums: WindowSums,
}

/// Running NDVI accumulator threaded across consecutive `build` calls.
///
/// Only the entries the rolling policy can still read are retained.
#[derive(Debug, Clone, Default)]
pub struct NdviHistory {
    entries: VecDeque<(NaiveDate, Option<f64>)>,
    recorded: usize,
}

impl NdviHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDate> {
        self.entries.back().map(|(d, _)| *d)
    }

    pub fn previous_ndvi(&self) -> Option<f64> {
        self.entries.back().and_then(|(_, v)| *v)
    }

    /// Records seen so far, including trimmed ones
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    /// Entries still held
    pub fn retained(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, date: NaiveDate, ndvi: Option<f64>) {
        self.entries.push_back((date, ndvi));
        self.recorded += 1;
    }

    /// Drop entries no later `build` under `policy` can read; `t` is the date
    /// just pushed
    fn trim(&mut self, policy: RollingPolicy, t: NaiveDate) {
        match policy {
            RollingPolicy::LastRecords(n) => {
                while self.entries.len() > n.max(1) {
                    self.entries.pop_front();
                }
            }
            RollingPolicy::ElapsedDays { days, min_samples } => {
                let start = t - Duration::days(days);
                let keep_observed = min_samples.max(1);
                while self.entries.len() > 1 {
                    let Some((date, _)) = self.entries.front() else {
                        break;
                    };
                    if *date > start {
                        break;
                    }
                    let observed_after = self.entries.iter().skip(1).filter(|(_, v)| v.is_some()).count();
                    if observed_after < keep_observed {
                        break;
                    }
                    self.entries.pop_front();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeSeriesFeatureBuilder {
    config: BuilderConfig,
}

impl TimeSeriesFeatureBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Derive the feature record for date `t`.
    ///
    /// Fails only when `t` is not strictly after the last date recorded in
    /// `history`; every missing observation degrades to `None` instead.
    pub fn build(
        &self,
        t: NaiveDate,
        inputs: &BuildInputs<'_>,
        history: &mut NdviHistory,
    ) -> BloomResult<FeatureRecord> {
        if let Some(previous) = history.last_timestamp() {
            if t <= previous {
                return Err(BloomError::InputOrdering { previous, current: t });
            }
        }

        let ndvi = inputs.vegetation.and_then(|s| s.band(bands::NDVI));
        let evi = inputs.vegetation.and_then(|s| s.band(bands::EVI));
        let lst_day = inputs.lst.and_then(|s| s.band(bands::LST_DAY));
        let lst_night = inputs.lst.and_then(|s| s.band(bands::LST_NIGHT));
        let et_estimate = inputs.et_composite.and_then(|s| s.band(bands::ET));

        let ndvi_evi_ratio = match (ndvi, evi) {
            (Some(n), Some(e)) if e != 0.0 => Some(n / e),
            _ => None,
        };

        let (lst_range, lst_mean) = match (lst_day, lst_night) {
            (Some(day), Some(night)) => (Some(day - night), Some((day + night) / 2.0)),
            _ => (None, None),
        };

        let thermal_stress = lst_day.map(|day| day > THERMAL_STRESS_LST_KELVIN);

        let ndvi_change = match (ndvi, history.previous_ndvi()) {
            (Some(now), Some(prev)) => Some(now - prev),
            _ => None,
        };

        history.push(t, ndvi);
        let ndvi_rolling_mean_30d = self.rolling_mean(t, ndvi, history);
        history.trim(self.config.rolling, t);

        let precip = inputs.precip_sums.as_array();
        let balance = inputs.precip_sums.minus(&inputs.et_sums);
        let calendar = CalendarFeatures::from_date(t, self.config.hemisphere);

        Ok(FeatureRecord {
            timestamp: t,
            season: calendar.season,
            ndvi,
            evi,
            lst_day,
            lst_night,
            precip_7d: precip[0],
            precip_15d: precip[1],
            precip_30d: precip[2],
            precip_60d: precip[3],
            precip_90d: precip[4],
            lst_range,
            lst_mean,
            ndvi_evi_ratio,
            year: calendar.year,
            month: calendar.month,
            day_of_year: calendar.day_of_year,
            thermal_stress,
            ndvi_change,
            ndvi_rolling_mean_30d,
            et_estimate,
            water_balance_7d: balance[0],
            water_balance_15d: balance[1],
            water_balance_30d: balance[2],
            water_balance_60d: balance[3],
            water_balance_90d: balance[4],
        })
    }

    /// `history` already contains the current entry
    fn rolling_mean(&self, t: NaiveDate, current: Option<f64>, history: &NdviHistory) -> Option<f64> {
        match self.config.rolling {
            RollingPolicy::LastRecords(n) => {
                if n == 0 || history.len() <= n {
                    return current;
                }
                let sum: f64 = history
                    .entries
                    .iter()
                    .rev()
                    .take(n)
                    .map(|(_, v)| v.unwrap_or(0.0))
                    .sum();
                Some(sum / n as f64)
            }
            RollingPolicy::ElapsedDays { days, min_samples } => {
                let start = t - Duration::days(days);
                let in_window: Vec<f64> = history
                    .entries
                    .iter()
                    .filter(|(d, _)| *d > start)
                    .filter_map(|(_, v)| *v)
                    .collect();

                let values = if in_window.len() >= min_samples {
                    in_window
                } else {
                    history
                        .entries
                        .iter()
                        .rev()
                        .filter_map(|(_, v)| *v)
                        .take(min_samples.max(1))
                        .collect()
                };

                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceKind;
    use crate::features::calendar::Season;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn veg(d: NaiveDate, ndvi: Option<f64>, evi: Option<f64>) -> EnvironmentalSample {
        EnvironmentalSample::new(d, SourceKind::VegetationIndex)
            .with_band(bands::NDVI, ndvi)
            .with_band(bands::EVI, evi)
    }

    fn lst(d: NaiveDate, day: Option<f64>, night: Option<f64>) -> EnvironmentalSample {
        EnvironmentalSample::new(d, SourceKind::LandSurfaceTemp)
            .with_band(bands::LST_DAY, day)
            .with_band(bands::LST_NIGHT, night)
    }

    fn build_one(v: &EnvironmentalSample, l: &EnvironmentalSample) -> FeatureRecord {
        let inputs = BuildInputs {
            vegetation: Some(v),
            lst: Some(l),
            ..Default::default()
        };
        TimeSeriesFeatureBuilder::default()
            .build(v.timestamp, &inputs, &mut NdviHistory::new())
            .unwrap()
    }

    #[test]
    fn test_zero_evi_gives_null_ratio() {
        let d = date(2024, 5, 1);
        for ndvi in [-0.5, 0.0, 0.3, 0.9] {
            let record = build_one(&veg(d, Some(ndvi), Some(0.0)), &lst(d, None, None));
            assert_eq!(record.ndvi_evi_ratio, None);
        }
        let record = build_one(&veg(d, Some(0.6), Some(0.3)), &lst(d, None, None));
        assert_relative_eq!(record.ndvi_evi_ratio.unwrap(), 2.0);
    }

    #[test]
    fn test_lst_identity() {
        let d = date(2024, 7, 1);
        for (day, night) in [(310.2, 290.1), (280.0, 281.5), (300.0, 300.0)] {
            let record = build_one(&veg(d, None, None), &lst(d, Some(day), Some(night)));
            let range = record.lst_range.unwrap();
            let mean = record.lst_mean.unwrap();
            assert_relative_eq!(range + 2.0 * night, 2.0 * mean, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_lst_null_propagates() {
        let d = date(2024, 7, 1);
        let record = build_one(&veg(d, None, None), &lst(d, Some(300.0), None));
        assert_eq!(record.lst_range, None);
        assert_eq!(record.lst_mean, None);
        assert_eq!(record.thermal_stress, Some(false));

        let record = build_one(&veg(d, None, None), &lst(d, None, Some(290.0)));
        assert_eq!(record.thermal_stress, None);
    }

    #[test]
    fn test_thermal_stress_boundary() {
        let d = date(2024, 7, 1);
        let at = build_one(&veg(d, None, None), &lst(d, Some(305.0), Some(290.0)));
        assert_eq!(at.thermal_stress, Some(false));
        let above = build_one(&veg(d, None, None), &lst(d, Some(305.01), Some(290.0)));
        assert_eq!(above.thermal_stress, Some(true));
    }

    #[test]
    fn test_ndvi_change_and_legacy_rolling_mean() {
        let builder = TimeSeriesFeatureBuilder::default();
        let mut history = NdviHistory::new();
        let dates = [date(2024, 1, 1), date(2024, 1, 17), date(2024, 2, 2), date(2024, 2, 18)];
        let ndvi = [Some(0.2), Some(0.4), None, Some(0.8)];

        let mut records = Vec::new();
        for (d, n) in dates.iter().zip(ndvi) {
            let v = veg(*d, n, Some(0.3));
            let inputs = BuildInputs {
                vegetation: Some(&v),
                ..Default::default()
            };
            records.push(builder.build(*d, &inputs, &mut history).unwrap());
        }

        assert_eq!(records[0].ndvi_change, None);
        assert_relative_eq!(records[1].ndvi_change.unwrap(), 0.2, epsilon = 1e-12);
        assert_eq!(records[2].ndvi_change, None);
        // previous record had no NDVI
        assert_eq!(records[3].ndvi_change, None);

        // current value until more than two records exist
        assert_eq!(records[0].ndvi_rolling_mean_30d, Some(0.2));
        assert_eq!(records[1].ndvi_rolling_mean_30d, Some(0.4));
        // last two with the missing value counted as zero
        assert_relative_eq!(records[2].ndvi_rolling_mean_30d.unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(records[3].ndvi_rolling_mean_30d.unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_elapsed_days_rolling_mean() {
        let builder = TimeSeriesFeatureBuilder::new(BuilderConfig {
            rolling: RollingPolicy::ElapsedDays { days: 30, min_samples: 1 },
            hemisphere: Hemisphere::Northern,
        });
        let mut history = NdviHistory::new();
        let points = [
            (date(2024, 1, 1), Some(0.2)),
            (date(2024, 1, 17), Some(0.4)),
            (date(2024, 2, 2), None),
            (date(2024, 3, 20), Some(0.6)),
        ];
        let mut out = Vec::new();
        for (d, n) in points {
            let v = veg(d, n, None);
            let inputs = BuildInputs {
                vegetation: Some(&v),
                ..Default::default()
            };
            out.push(builder.build(d, &inputs, &mut history).unwrap().ndvi_rolling_mean_30d);
        }
        assert_eq!(out[0], Some(0.2));
        assert_relative_eq!(out[1].unwrap(), 0.3, epsilon = 1e-12);
        // window (Jan 3, Feb 2] holds only the 0.4 observation
        assert_relative_eq!(out[2].unwrap(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(out[3].unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_history_stays_bounded() {
        let start = date(2020, 1, 1);
        let dates: Vec<NaiveDate> = (0..200).map(|i| start + Duration::days(16 * i)).collect();

        let legacy = TimeSeriesFeatureBuilder::default();
        let mut history = NdviHistory::new();
        let mut last = None;
        for (i, d) in dates.iter().enumerate() {
            let v = veg(*d, Some(0.1 + (i % 5) as f64 * 0.1), None);
            let inputs = BuildInputs {
                vegetation: Some(&v),
                ..Default::default()
            };
            last = legacy.build(*d, &inputs, &mut history).unwrap().ndvi_rolling_mean_30d;
            assert!(history.retained() <= 2);
        }
        assert_eq!(history.len(), 200);
        // records 198 and 199 carry 0.4 and 0.5
        assert_relative_eq!(last.unwrap(), 0.45, epsilon = 1e-12);

        let elapsed = TimeSeriesFeatureBuilder::new(BuilderConfig {
            rolling: RollingPolicy::ElapsedDays { days: 30, min_samples: 3 },
            hemisphere: Hemisphere::Northern,
        });
        let mut history = NdviHistory::new();
        for d in &dates {
            let v = veg(*d, Some(0.5), None);
            let inputs = BuildInputs {
                vegetation: Some(&v),
                ..Default::default()
            };
            elapsed.build(*d, &inputs, &mut history).unwrap();
            assert!(history.retained() <= 4);
        }
    }

    #[test]
    fn test_elapsed_days_falls_back_to_available() {
        let builder = TimeSeriesFeatureBuilder::new(BuilderConfig {
            rolling: RollingPolicy::ElapsedDays { days: 30, min_samples: 2 },
            hemisphere: Hemisphere::Northern,
        });
        let mut history = NdviHistory::new();
        let v1 = veg(date(2024, 1, 1), Some(0.2), None);
        let v2 = veg(date(2024, 4, 1), Some(0.6), None);
        for v in [&v1, &v2] {
            let inputs = BuildInputs {
                vegetation: Some(v),
                ..Default::default()
            };
            let record = builder.build(v.timestamp, &inputs, &mut history).unwrap();
            if v.timestamp == v2.timestamp {
                assert_relative_eq!(record.ndvi_rolling_mean_30d.unwrap(), 0.4, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_water_balance_needs_both_operands() {
        let d = date(2024, 6, 1);
        let v = veg(d, Some(0.5), Some(0.3));
        let inputs = BuildInputs {
            vegetation: Some(&v),
            precip_sums: WindowSums::new([Some(10.0), Some(25.0), None, Some(80.0), Some(100.0)]),
            et_sums: WindowSums::new([Some(3.0), None, Some(12.0), Some(30.0), Some(45.0)]),
            ..Default::default()
        };
        let record = TimeSeriesFeatureBuilder::default()
            .build(d, &inputs, &mut NdviHistory::new())
            .unwrap();
        assert_eq!(record.precip_7d, Some(10.0));
        assert_eq!(record.precip_30d, None);
        assert_eq!(record.water_balance_7d, Some(7.0));
        assert_eq!(record.water_balance_15d, None);
        assert_eq!(record.water_balance_30d, None);
        assert_eq!(record.water_balance_60d, Some(50.0));
        assert_eq!(record.water_balance_90d, Some(55.0));
    }

    #[test]
    fn test_missing_sources_never_fail() {
        let d = date(2024, 12, 15);
        let record = TimeSeriesFeatureBuilder::default()
            .build(d, &BuildInputs::default(), &mut NdviHistory::new())
            .unwrap();
        assert_eq!(record.ndvi, None);
        assert_eq!(record.et_estimate, None);
        assert_eq!(record.ndvi_rolling_mean_30d, None);
        assert_eq!(record.season, Season::Winter);
        assert_eq!(record.day_of_year, 350);
    }

    #[test]
    fn test_out_of_order_timestamp_rejected() {
        let builder = TimeSeriesFeatureBuilder::default();
        let mut history = NdviHistory::new();
        builder
            .build(date(2024, 3, 1), &BuildInputs::default(), &mut history)
            .unwrap();

        let err = builder
            .build(date(2024, 2, 1), &BuildInputs::default(), &mut history)
            .unwrap_err();
        assert!(matches!(err, BloomError::InputOrdering { .. }));

        let err = builder
            .build(date(2024, 3, 1), &BuildInputs::default(), &mut history)
            .unwrap_err();
        assert!(matches!(err, BloomError::InputOrdering { .. }));
        // failed calls leave the accumulator untouched
        assert_eq!(history.len(), 1);
    }
}
