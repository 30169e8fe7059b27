//! Feature records: the model-ready row type and its canonical schema

use crate::features::calendar::Season;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Trailing window sizes (days) used for precipitation and water balance
pub const WINDOW_DAYS: [u32; 5] = [7, 15, 30, 60, 90];

/// Canonical column order the regression model was trained on
pub const FEATURE_COLUMNS: [&str; 24] = [
    "NDVI",
    "EVI",
    "LST_day",
    "LST_night",
    "precip_7d",
    "precip_15d",
    "precip_30d",
    "precip_60d",
    "precip_90d",
    "LST_range",
    "LST_mean",
    "NDVI_EVI_ratio",
    "year",
    "month",
    "day_of_year",
    "thermal_stress",
    "NDVI_change",
    "NDVI_rolling_mean_30d",
    "ET_estimate",
    "water_balance_7d",
    "water_balance_15d",
    "water_balance_30d",
    "water_balance_60d",
    "water_balance_90d",
];

/// Owned copy of the canonical schema
pub fn default_schema() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Column lookup used by the assembler.
///
/// Returns `None` when the column is unknown to the record and `Some(None)`
/// when it is known but unobserved.
pub trait FeatureLookup {
    fn lookup(&self, column: &str) -> Option<Option<f64>>;
}

/// One row of the model-ready table for a single parcel and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub timestamp: NaiveDate,
    pub season: Season,

    #[serde(rename = "NDVI")]
    pub ndvi: Option<f64>,
    #[serde(rename = "EVI")]
    pub evi: Option<f64>,
    #[serde(rename = "LST_day")]
    pub lst_day: Option<f64>,
    #[serde(rename = "LST_night")]
    pub lst_night: Option<f64>,

    pub precip_7d: Option<f64>,
    pub precip_15d: Option<f64>,
    pub precip_30d: Option<f64>,
    pub precip_60d: Option<f64>,
    pub precip_90d: Option<f64>,

    #[serde(rename = "LST_range")]
    pub lst_range: Option<f64>,
    #[serde(rename = "LST_mean")]
    pub lst_mean: Option<f64>,
    #[serde(rename = "NDVI_EVI_ratio")]
    pub ndvi_evi_ratio: Option<f64>,

    pub year: i32,
    pub month: u32,
    pub day_of_year: u32,

    pub thermal_stress: Option<bool>,
    #[serde(rename = "NDVI_change")]
    pub ndvi_change: Option<f64>,
    #[serde(rename = "NDVI_rolling_mean_30d")]
    pub ndvi_rolling_mean_30d: Option<f64>,
    #[serde(rename = "ET_estimate")]
    pub et_estimate: Option<f64>,

    pub water_balance_7d: Option<f64>,
    pub water_balance_15d: Option<f64>,
    pub water_balance_30d: Option<f64>,
    pub water_balance_60d: Option<f64>,
    pub water_balance_90d: Option<f64>,
}

impl FeatureRecord {
    /// Precipitation sums in `WINDOW_DAYS` order
    pub fn precip_windows(&self) -> [Option<f64>; 5] {
        [
            self.precip_7d,
            self.precip_15d,
            self.precip_30d,
            self.precip_60d,
            self.precip_90d,
        ]
    }

    /// Water balance in `WINDOW_DAYS` order
    pub fn water_balance_windows(&self) -> [Option<f64>; 5] {
        [
            self.water_balance_7d,
            self.water_balance_15d,
            self.water_balance_30d,
            self.water_balance_60d,
            self.water_balance_90d,
        ]
    }

    /// Mean of day and night LST converted to Celsius
    pub fn temperature_celsius(&self) -> Option<f64> {
        self.lst_mean.map(|k| k - 273.15)
    }

    /// Loosely-keyed view of the schema columns
    pub fn to_row(&self) -> FeatureRow {
        let mut values = FxHashMap::default();
        for column in FEATURE_COLUMNS {
            values.insert(column.to_string(), self.lookup(column).flatten());
        }
        FeatureRow { values }
    }
}

impl FeatureLookup for FeatureRecord {
    fn lookup(&self, column: &str) -> Option<Option<f64>> {
        let value = match column {
            "NDVI" => self.ndvi,
            "EVI" => self.evi,
            "LST_day" => self.lst_day,
            "LST_night" => self.lst_night,
            "precip_7d" => self.precip_7d,
            "precip_15d" => self.precip_15d,
            "precip_30d" => self.precip_30d,
            "precip_60d" => self.precip_60d,
            "precip_90d" => self.precip_90d,
            "LST_range" => self.lst_range,
            "LST_mean" => self.lst_mean,
            "NDVI_EVI_ratio" => self.ndvi_evi_ratio,
            "year" => Some(self.year as f64),
            "month" => Some(self.month as f64),
            "day_of_year" => Some(self.day_of_year as f64),
            "thermal_stress" => self.thermal_stress.map(|s| if s { 1.0 } else { 0.0 }),
            "NDVI_change" => self.ndvi_change,
            "NDVI_rolling_mean_30d" => self.ndvi_rolling_mean_30d,
            "ET_estimate" => self.et_estimate,
            "water_balance_7d" => self.water_balance_7d,
            "water_balance_15d" => self.water_balance_15d,
            "water_balance_30d" => self.water_balance_30d,
            "water_balance_60d" => self.water_balance_60d,
            "water_balance_90d" => self.water_balance_90d,
            _ => return None,
        };
        Some(value)
    }
}

/// Externally supplied feature row (API payloads, CSV rows).
///
/// Unlike `FeatureRecord` its shape is not guaranteed, so it is the place a
/// missing-column failure can come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRow {
    pub values: FxHashMap<String, Option<f64>>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: Option<f64>) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Option<f64>> {
        self.values.remove(column)
    }
}

impl FeatureLookup for FeatureRow {
    fn lookup(&self, column: &str) -> Option<Option<f64>> {
        self.values.get(column).copied()
    }
}

/// Ordered-by-timestamp records for one parcel over one analysis window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSeries {
    records: Vec<FeatureRecord>,
}

impl FeatureSeries {
    /// Build from records, rejecting non-increasing timestamps
    pub fn from_records(records: Vec<FeatureRecord>) -> crate::BloomResult<Self> {
        for pair in records.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(crate::BloomError::InputOrdering {
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }
        Ok(Self { records })
    }

    pub(crate) fn push_unchecked(&mut self, record: FeatureRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&FeatureRecord> {
        self.records.last()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    pub fn ndvi_values(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.ndvi).collect()
    }

    pub fn into_records(self) -> Vec<FeatureRecord> {
        self.records
    }
}
