//! Raw environmental observations
//!
//! One `EnvironmentalSample` is one composite (or daily) reading from one
//! satellite product over a parcel. Band values are `None` where the pixel
//! window was cloud-masked or otherwise unobserved.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Band names per product
pub mod bands {
    pub const NDVI: &str = "NDVI";
    pub const EVI: &str = "EVI";
    pub const LST_DAY: &str = "LST_day";
    pub const LST_NIGHT: &str = "LST_night";
    pub const PRECIPITATION: &str = "precipitation";
    pub const ET: &str = "ET";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 16-day NDVI/EVI composites
    VegetationIndex,
    /// 8-day day/night LST composites (Kelvin)
    LandSurfaceTemp,
    /// Daily precipitation (mm)
    Precipitation,
    /// 8-day evapotranspiration composites (mm)
    Evapotranspiration,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::VegetationIndex,
        SourceKind::LandSurfaceTemp,
        SourceKind::Precipitation,
        SourceKind::Evapotranspiration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::VegetationIndex => "vegetation_index",
            SourceKind::LandSurfaceTemp => "land_surface_temp",
            SourceKind::Precipitation => "precipitation",
            SourceKind::Evapotranspiration => "evapotranspiration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "vegetation_index" => Some(SourceKind::VegetationIndex),
            "land_surface_temp" => Some(SourceKind::LandSurfaceTemp),
            "precipitation" => Some(SourceKind::Precipitation),
            "evapotranspiration" => Some(SourceKind::Evapotranspiration),
            _ => None,
        }
    }

    /// Days a single composite of this product covers
    pub fn composite_days(&self) -> i64 {
        match self {
            SourceKind::VegetationIndex => 16,
            SourceKind::LandSurfaceTemp => 8,
            SourceKind::Precipitation => 1,
            SourceKind::Evapotranspiration => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSample {
    pub timestamp: NaiveDate,
    pub source_kind: SourceKind,
    pub values: FxHashMap<String, Option<f64>>,
}

impl EnvironmentalSample {
    pub fn new(timestamp: NaiveDate, source_kind: SourceKind) -> Self {
        Self {
            timestamp,
            source_kind,
            values: FxHashMap::default(),
        }
    }

    pub fn with_band(mut self, band: &str, value: Option<f64>) -> Self {
        self.values.insert(band.to_string(), value);
        self
    }

    /// Band value; absent bands and masked pixels both read as `None`
    pub fn band(&self, band: &str) -> Option<f64> {
        self.values.get(band).copied().flatten()
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `end`
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_band_is_none() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let sample = EnvironmentalSample::new(date, SourceKind::VegetationIndex)
            .with_band(bands::NDVI, None)
            .with_band(bands::EVI, Some(0.3));
        assert_eq!(sample.band(bands::NDVI), None);
        assert_eq!(sample.band(bands::EVI), Some(0.3));
        assert_eq!(sample.band("missing"), None);
    }

    #[test]
    fn test_source_kind_parse_roundtrip() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::parse("radar"), None);
    }

    #[test]
    fn test_trailing_range() {
        let end = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let range = DateRange::trailing(end, 90);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(range.contains(end));
    }
}
