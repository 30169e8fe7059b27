//! Feature table I/O with Polars
//!
//! Writes a `FeatureSeries` as the flat training table (one row per date, the
//! canonical columns plus `date`, `timestamp`, `season`) and reads such tables
//! back as loosely keyed rows.

use crate::features::record::{FeatureLookup, FeatureRow, FeatureSeries, FEATURE_COLUMNS};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// One row read back from a feature table
#[derive(Debug, Clone)]
pub struct TableRow {
    pub date: Option<NaiveDate>,
    pub row: FeatureRow,
}

/// Convert a series into a DataFrame in canonical column order
pub fn series_to_dataframe(series: &FeatureSeries) -> Result<DataFrame> {
    let records = series.records();

    let dates: Vec<String> = records
        .iter()
        .map(|r| r.timestamp.format("%Y-%m-%d").to_string())
        .collect();
    let timestamps: Vec<i64> = records
        .iter()
        .map(|r| r.timestamp.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
        .collect();
    let seasons: Vec<&str> = records.iter().map(|r| r.season.as_str()).collect();

    let mut columns = vec![
        Column::new("date".into(), dates),
        Column::new("timestamp".into(), timestamps),
        Column::new("season".into(), seasons),
    ];

    for name in FEATURE_COLUMNS {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.lookup(name).flatten()).collect();
        columns.push(Column::new(name.into(), values));
    }

    DataFrame::new(columns).with_context(|| "Failed to assemble feature DataFrame")
}

/// Write the series as CSV
pub fn write_csv(series: &FeatureSeries, path: &Path) -> Result<()> {
    let mut df = series_to_dataframe(series)?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create feature CSV: {:?}", path))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("Failed to write feature CSV: {:?}", path))?;
    tracing::info!("Wrote {} feature rows to {:?}", df.height(), path);
    Ok(())
}

/// Write the series as Parquet
pub fn write_parquet(series: &FeatureSeries, path: &Path) -> Result<()> {
    let mut df = series_to_dataframe(series)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create feature parquet: {:?}", path))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write feature parquet: {:?}", path))?;
    tracing::info!("Wrote {} feature rows to {:?}", df.height(), path);
    Ok(())
}

/// Read a feature CSV back as loosely keyed rows.
///
/// Columns absent from the file are absent from every row, so a truncated
/// table surfaces as a schema mismatch at assembly time.
pub fn read_csv_rows(path: &Path) -> Result<Vec<TableRow>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.into()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load feature CSV: {:?}", path))?;

    let mut rows: Vec<TableRow> = (0..df.height())
        .map(|_| TableRow {
            date: None,
            row: FeatureRow::new(),
        })
        .collect();

    if let Ok(date_col) = df.column("date") {
        let date_col = date_col
            .cast(&DataType::String)
            .with_context(|| "Column 'date' is not castable to string")?;
        let dates = date_col.str()?;
        for (row, value) in rows.iter_mut().zip(dates.into_iter()) {
            row.date = value.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        }
    }

    for name in FEATURE_COLUMNS {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let column = column
            .cast(&DataType::Float64)
            .with_context(|| format!("Column '{}' is not numeric", name))?;
        let values = column.f64()?;
        for (row, value) in rows.iter_mut().zip(values.into_iter()) {
            row.row.values.insert(name.to_string(), value);
        }
    }

    Ok(rows)
}
