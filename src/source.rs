//! Geospatial sample acquisition
//!
//! The satellite-data service is an external collaborator reached through
//! `GeospatialSource`. Two local implementations are provided: an in-memory
//! store and a long-format CSV file read with Polars.

use crate::data::{DateRange, EnvironmentalSample, SourceKind};
use crate::error::BloomResult;
use crate::geometry::Parcel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::*;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait GeospatialSource: Send + Sync {
    /// Samples of one product over `parcel` with timestamps inside `range`
    async fn fetch(
        &self,
        parcel: &Parcel,
        kind: SourceKind,
        range: DateRange,
    ) -> BloomResult<Vec<EnvironmentalSample>>;
}

/// Samples held in memory, shared by every parcel
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    samples: Arc<Vec<EnvironmentalSample>>,
}

impl InMemorySource {
    pub fn new(mut samples: Vec<EnvironmentalSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            samples: Arc::new(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn select(&self, kind: SourceKind, range: DateRange) -> Vec<EnvironmentalSample> {
        self.samples
            .iter()
            .filter(|s| s.source_kind == kind && range.contains(s.timestamp))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GeospatialSource for InMemorySource {
    async fn fetch(
        &self,
        _parcel: &Parcel,
        kind: SourceKind,
        range: DateRange,
    ) -> BloomResult<Vec<EnvironmentalSample>> {
        Ok(self.select(kind, range))
    }
}

/// Long-format CSV: `timestamp,source_kind,band,value`.
///
/// Rows sharing a timestamp and source kind form one sample. An empty
/// `value` is a masked observation.
#[derive(Debug, Clone)]
pub struct CsvSampleSource {
    inner: InMemorySource,
}

impl CsvSampleSource {
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading environmental samples from {:?}", path);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.into()))
            .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
            .finish()
            .with_context(|| format!("Failed to load sample CSV: {:?}", path))?;

        let samples = samples_from_dataframe(&df)
            .with_context(|| format!("Malformed sample CSV: {:?}", path))?;
        tracing::info!("Loaded {} samples ({} rows)", samples.len(), df.height());

        Ok(Self {
            inner: InMemorySource::new(samples),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl GeospatialSource for CsvSampleSource {
    async fn fetch(
        &self,
        parcel: &Parcel,
        kind: SourceKind,
        range: DateRange,
    ) -> BloomResult<Vec<EnvironmentalSample>> {
        self.inner.fetch(parcel, kind, range).await
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?
        .cast(&DataType::String)?;
    Ok(column.str()?.clone())
}

/// Group long-format rows into samples
pub fn samples_from_dataframe(df: &DataFrame) -> Result<Vec<EnvironmentalSample>> {
    let timestamps = string_column(df, "timestamp")?;
    let kinds = string_column(df, "source_kind")?;
    let bands = string_column(df, "band")?;
    let raw_values = string_column(df, "value")?;
    let values = df
        .column("value")
        .with_context(|| "Missing column 'value'")?
        .cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut grouped: FxHashMap<(NaiveDate, SourceKind), EnvironmentalSample> = FxHashMap::default();

    for (row, (((ts, kind), band), value)) in timestamps
        .into_iter()
        .zip(kinds.into_iter())
        .zip(bands.into_iter())
        .zip(values.into_iter().zip(raw_values.into_iter()))
        .enumerate()
    {
        let (Some(ts), Some(kind), Some(band)) = (ts, kind, band) else {
            tracing::warn!("Skipping incomplete sample row {}", row);
            continue;
        };
        let value = match value {
            (Some(v), _) => Some(v),
            (None, Some(raw)) if !raw.trim().is_empty() => {
                anyhow::bail!("Row {}: invalid value '{}'", row, raw)
            }
            (None, _) => None,
        };
        let date = NaiveDate::parse_from_str(ts.trim(), "%Y-%m-%d")
            .with_context(|| format!("Row {}: invalid timestamp '{}'", row, ts))?;
        let kind = SourceKind::parse(kind)
            .with_context(|| format!("Row {}: unknown source kind '{}'", row, kind))?;

        grouped
            .entry((date, kind))
            .or_insert_with(|| EnvironmentalSample::new(date, kind))
            .values
            .insert(band.trim().to_string(), value);
    }

    let mut samples: Vec<EnvironmentalSample> = grouped.into_values().collect();
    samples.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source_kind.as_str().cmp(b.source_kind.as_str()))
    });
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bands;

    fn parcel() -> Parcel {
        Parcel::new(vec![[0.0, 0.0], [0.01, 0.0], [0.01, 0.01]]).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const CSV: &str = "timestamp,source_kind,band,value
2024-03-01,vegetation_index,NDVI,0.41
2024-03-01,vegetation_index,EVI,0.25
2024-03-01,precipitation,precipitation,3.5
2024-03-02,precipitation,precipitation,
2024-03-17,vegetation_index,NDVI,0.47
2024-03-17,vegetation_index,EVI,0.29
";

    #[tokio::test]
    async fn test_csv_source_groups_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        std::fs::write(&path, CSV).unwrap();

        let source = CsvSampleSource::load(&path).unwrap();
        assert_eq!(source.len(), 4);

        let veg = source
            .fetch(&parcel(), SourceKind::VegetationIndex, DateRange::new(date(2024, 3, 1), date(2024, 3, 31)))
            .await
            .unwrap();
        assert_eq!(veg.len(), 2);
        assert_eq!(veg[0].band(bands::NDVI), Some(0.41));
        assert_eq!(veg[1].band(bands::EVI), Some(0.29));

        let rain = source
            .fetch(&parcel(), SourceKind::Precipitation, DateRange::new(date(2024, 3, 2), date(2024, 3, 2)))
            .await
            .unwrap();
        assert_eq!(rain.len(), 1);
        assert_eq!(rain[0].band(bands::PRECIPITATION), None);
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        std::fs::write(&path, "timestamp,source_kind,band,value\n2024-03-01,radar,VV,0.1\n").unwrap();
        assert!(CsvSampleSource::load(&path).is_err());
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        std::fs::write(
            &path,
            "timestamp,source_kind,band,value\n2024-03-01,vegetation_index,NDVI,0.41\n2024-03-17,vegetation_index,NDVI,abc\n",
        )
        .unwrap();

        let err = CsvSampleSource::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid value 'abc'"));
    }

    #[tokio::test]
    async fn test_late_fractional_value_after_integer_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let start = date(2024, 1, 1);
        let mut csv = String::from("timestamp,source_kind,band,value\n");
        for d in 0..150 {
            let t = start + chrono::Duration::days(d);
            csv.push_str(&format!("{},precipitation,precipitation,0\n", t.format("%Y-%m-%d")));
        }
        let late = start + chrono::Duration::days(150);
        csv.push_str(&format!("{},precipitation,precipitation,2.5\n", late.format("%Y-%m-%d")));
        std::fs::write(&path, csv).unwrap();

        let source = CsvSampleSource::load(&path).unwrap();
        assert_eq!(source.len(), 151);

        let rain = source
            .fetch(&parcel(), SourceKind::Precipitation, DateRange::new(late, late))
            .await
            .unwrap();
        assert_eq!(rain[0].band(bands::PRECIPITATION), Some(2.5));
    }
}
