//! Export the model-ready feature table for a sample file
//!
//! Reads long-format environmental samples, aligns them on the vegetation
//! cadence, and writes the feature table as CSV and Parquet (the layout the
//! regression model is trained on).
//!
//! Usage:
//!   cargo run --bin export_features -- <samples.csv> <output_stem> [northern|southern]

use anyhow::{bail, Context, Result};
use bloom_predictor_rust::features::{write_csv, write_parquet};
use bloom_predictor_rust::source::samples_from_dataframe;
use bloom_predictor_rust::{
    build_series, BuilderConfig, Hemisphere, SampleStreams, TimeSeriesFeatureBuilder,
};
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: export_features <samples.csv> <output_stem> [northern|southern]");
    }
    let samples_path = PathBuf::from(&args[1]);
    let stem = PathBuf::from(&args[2]);
    let hemisphere = match args.get(3).map(|s| s.to_lowercase()) {
        None => Hemisphere::Northern,
        Some(h) if h == "northern" => Hemisphere::Northern,
        Some(h) if h == "southern" => Hemisphere::Southern,
        Some(other) => bail!("unknown hemisphere '{}'", other),
    };

    println!("\n{}", "=".repeat(70));
    println!("Feature Table Export");
    println!("{}", "=".repeat(70));
    println!();

    let total_start = Instant::now();

    let load_start = Instant::now();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None) // Scan entire file
        .try_into_reader_with_file_path(Some(samples_path.clone()))?
        .finish()
        .with_context(|| format!("Failed to load {:?}", samples_path))?;
    let samples = samples_from_dataframe(&df)?;
    println!(
        "  Loaded:  {} rows -> {} samples ({:.3} ms)",
        df.height(),
        samples.len(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    let build_start = Instant::now();
    let streams = SampleStreams::from_samples(samples);
    let builder = TimeSeriesFeatureBuilder::new(BuilderConfig {
        hemisphere,
        ..BuilderConfig::default()
    });
    let series = build_series(&builder, &streams)?;
    println!(
        "  Built:   {} feature records ({:.3} ms)",
        series.len(),
        build_start.elapsed().as_secs_f64() * 1000.0
    );

    let csv_path = stem.with_extension("csv");
    let parquet_path = stem.with_extension("parquet");
    write_csv(&series, &csv_path)?;
    write_parquet(&series, &parquet_path)?;
    println!("  CSV:     {:?}", csv_path);
    println!("  Parquet: {:?}", parquet_path);

    println!();
    println!("Total time: {:.3} s", total_start.elapsed().as_secs_f64());

    Ok(())
}
