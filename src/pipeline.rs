//! Parcel-level orchestration
//!
//! Wires the acquisition collaborator, the feature builder, the prediction
//! engine and the narrative generator. Every collaborator is injected.

use crate::data::{DateRange, SourceKind};
use crate::engine::{PredictionEngine, PredictionResult};
use crate::error::{BloomError, BloomResult};
use crate::features::builder::TimeSeriesFeatureBuilder;
use crate::features::record::{FeatureRecord, FeatureSeries};
use crate::features::series::{build_current, build_series, SampleStreams};
use crate::geometry::{BoundingBox, Parcel};
use crate::narrative::generator::NarrativeGenerator;
use crate::narrative::types::{Narrative, NarrativeContext};
use crate::peaks::TemporalSummary;
use crate::source::GeospatialSource;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Look-back used to describe current conditions
pub const CURRENT_CONDITIONS_DAYS: i64 = 90;

/// Longest range accepted by `temporal_analysis`
pub const MAX_ANALYSIS_DAYS: i64 = 365 * 3;

/// Extra history fetched before a range so the 90-day windows are filled
const WINDOW_LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelSummary {
    pub centroid: [f64; 2],
    pub area_hectares: f64,
    pub bbox: BoundingBox,
}

impl From<&Parcel> for ParcelSummary {
    fn from(parcel: &Parcel) -> Self {
        Self {
            centroid: parcel.centroid(),
            area_hectares: parcel.area_hectares(),
            bbox: parcel.bbox(),
        }
    }
}

/// Everything the presentation layer needs for one parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomForecast {
    pub parcel: ParcelSummary,
    pub reference_date: NaiveDate,
    /// Date of the vegetation composite behind the current NDVI/EVI
    pub composite_date: NaiveDate,
    /// Conditions as of `reference_date`
    pub current: FeatureRecord,
    pub prediction: PredictionResult,
    pub narrative: Narrative,
}

pub struct BloomPipeline {
    source: Arc<dyn GeospatialSource>,
    engine: Arc<PredictionEngine>,
    narrator: NarrativeGenerator,
    builder: TimeSeriesFeatureBuilder,
}

impl BloomPipeline {
    pub fn new(
        source: Arc<dyn GeospatialSource>,
        engine: Arc<PredictionEngine>,
        narrator: NarrativeGenerator,
    ) -> Self {
        Self {
            source,
            engine,
            narrator,
            builder: TimeSeriesFeatureBuilder::default(),
        }
    }

    pub fn with_builder(mut self, builder: TimeSeriesFeatureBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn engine(&self) -> &Arc<PredictionEngine> {
        &self.engine
    }

    /// Feature series for every vegetation composite inside `range`
    pub async fn history(&self, parcel: &Parcel, range: DateRange) -> BloomResult<FeatureSeries> {
        if range.end < range.start {
            return Err(BloomError::InsufficientHistory(format!(
                "range end {} is before start {}",
                range.end, range.start
            )));
        }

        let lookback = range.start - Duration::days(WINDOW_LOOKBACK_DAYS);
        let composite_tail = range.end + Duration::days(SourceKind::LandSurfaceTemp.composite_days());
        let climate_range = DateRange::new(lookback, composite_tail);

        let streams = self
            .fetch_streams(parcel, range, climate_range, DateRange::new(lookback, range.end))
            .await?;
        build_series(&self.builder, &streams)
    }

    /// Fetch the four products concurrently; fails when no vegetation
    /// composite falls inside `vegetation_range`
    async fn fetch_streams(
        &self,
        parcel: &Parcel,
        vegetation_range: DateRange,
        climate_range: DateRange,
        precipitation_range: DateRange,
    ) -> BloomResult<SampleStreams> {
        let (vegetation, lst, precipitation, evapotranspiration) = tokio::try_join!(
            self.source.fetch(parcel, SourceKind::VegetationIndex, vegetation_range),
            self.source.fetch(parcel, SourceKind::LandSurfaceTemp, climate_range),
            self.source.fetch(parcel, SourceKind::Precipitation, precipitation_range),
            self.source.fetch(parcel, SourceKind::Evapotranspiration, climate_range),
        )?;

        tracing::debug!(
            "Fetched {} vegetation, {} LST, {} precipitation, {} ET samples for {}..{}",
            vegetation.len(),
            lst.len(),
            precipitation.len(),
            evapotranspiration.len(),
            vegetation_range.start,
            vegetation_range.end
        );

        let mut streams = SampleStreams {
            vegetation,
            lst,
            precipitation,
            evapotranspiration,
        };
        streams.sort();

        if streams.is_empty() {
            return Err(BloomError::InsufficientHistory(format!(
                "no vegetation composites between {} and {}",
                vegetation_range.start, vegetation_range.end
            )));
        }
        Ok(streams)
    }

    /// Bloom periods and NDVI statistics over `range`
    pub async fn temporal_analysis(
        &self,
        parcel: &Parcel,
        range: DateRange,
        relative_threshold: f64,
    ) -> BloomResult<TemporalSummary> {
        if range.end <= range.start {
            return Err(BloomError::InvalidRange(format!(
                "end date {} must be after start date {}",
                range.end, range.start
            )));
        }
        let days = (range.end - range.start).num_days();
        if days > MAX_ANALYSIS_DAYS {
            return Err(BloomError::InvalidRange(format!(
                "analysis period of {} days exceeds {} days",
                days, MAX_ANALYSIS_DAYS
            )));
        }

        let series = self.history(parcel, range).await?;
        let summary = TemporalSummary::from_series(&series, relative_threshold);
        tracing::info!(
            "Temporal analysis {}..{}: {} observations, {} bloom periods",
            range.start,
            range.end,
            summary.observations,
            summary.peak_count
        );
        Ok(summary)
    }

    /// Predict days until bloom from conditions as of `reference`.
    ///
    /// Vegetation, LST and ET come from the trailing `CURRENT_CONDITIONS_DAYS`;
    /// precipitation and water-balance windows end at `reference`.
    pub async fn predict(&self, parcel: &Parcel, reference: NaiveDate) -> BloomResult<BloomForecast> {
        let range = DateRange::trailing(reference, CURRENT_CONDITIONS_DAYS);
        let streams = self.fetch_streams(parcel, range, range, range).await?;
        let (current, composite_date) = build_current(&self.builder, &streams, reference)?;

        let prediction = self.engine.predict_result(&current, reference).await?;
        let parcel_summary = ParcelSummary::from(parcel);

        let context = NarrativeContext {
            days_until_bloom: prediction.whole_days(),
            confidence: prediction.probability,
            ndvi: current.ndvi.unwrap_or(0.0),
            temperature: current.temperature_celsius().unwrap_or(0.0),
            precipitation_7d: current.precip_7d.unwrap_or(0.0),
            area_hectares: parcel_summary.area_hectares,
        };
        let narrative = self.narrator.generate(&context).await;

        tracing::info!(
            "Predicted {:.1} days until bloom ({}), narrative from {}",
            prediction.days_until_bloom,
            prediction.status,
            if narrative.is_fallback() { "fallback" } else { "service" }
        );

        Ok(BloomForecast {
            parcel: parcel_summary,
            reference_date: reference,
            composite_date,
            current,
            prediction,
            narrative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::linear_bundle;
    use crate::features::series::test_support::synthetic_streams;
    use crate::source::InMemorySource;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parcel() -> Parcel {
        Parcel::new(vec![[-74.0, 4.0], [-73.99, 4.0], [-73.99, 4.01], [-74.0, 4.01]]).unwrap()
    }

    fn pipeline(source: InMemorySource) -> BloomPipeline {
        BloomPipeline::new(
            Arc::new(source),
            Arc::new(PredictionEngine::from_bundle(linear_bundle())),
            NarrativeGenerator::fallback_only(),
        )
    }

    fn seasonal_source() -> InMemorySource {
        let streams = synthetic_streams(date(2024, 1, 1), 12, &[0.2, 0.3, 0.5, 0.3, 0.2, 0.6]);
        let mut samples = streams.vegetation;
        samples.extend(streams.lst);
        samples.extend(streams.precipitation);
        samples.extend(streams.evapotranspiration);
        InMemorySource::new(samples)
    }

    #[tokio::test]
    async fn test_history_fills_windows_from_lookback() {
        let p = pipeline(seasonal_source());
        let series = p
            .history(&parcel(), DateRange::new(date(2024, 3, 1), date(2024, 4, 30)))
            .await
            .unwrap();

        // composites on Mar 5, Mar 21, Apr 6, Apr 22
        assert_eq!(series.len(), 4);
        let first = &series.records()[0];
        assert_eq!(first.timestamp, date(2024, 3, 5));
        assert_relative_eq!(first.precip_90d.unwrap(), 180.0);
    }

    #[tokio::test]
    async fn test_empty_range_is_insufficient_history() {
        let p = pipeline(seasonal_source());
        let err = p
            .history(&parcel(), DateRange::new(date(2023, 1, 1), date(2023, 2, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, BloomError::InsufficientHistory(_)));
    }

    #[tokio::test]
    async fn test_temporal_analysis_finds_peaks() {
        let p = pipeline(seasonal_source());
        let summary = p
            .temporal_analysis(&parcel(), DateRange::new(date(2024, 1, 1), date(2024, 3, 31)), 0.1)
            .await
            .unwrap();
        assert_eq!(summary.observations, 6);
        assert_eq!(summary.peak_count, 1);
        assert_eq!(summary.bloom_periods[0].date, date(2024, 2, 2));
    }

    #[tokio::test]
    async fn test_temporal_range_must_move_forward() {
        let p = pipeline(seasonal_source());
        for (start, end) in [(date(2024, 3, 1), date(2024, 3, 1)), (date(2024, 3, 2), date(2024, 3, 1))] {
            let err = p
                .temporal_analysis(&parcel(), DateRange::new(start, end), 0.1)
                .await
                .unwrap_err();
            assert!(matches!(err, BloomError::InvalidRange(_)));
            assert_eq!(err.kind(), crate::error::FailureKind::FixInput);
        }
    }

    #[tokio::test]
    async fn test_temporal_range_capped_at_three_years() {
        let p = pipeline(seasonal_source());
        let start = date(2021, 1, 1);

        let too_long = DateRange::new(start, start + Duration::days(MAX_ANALYSIS_DAYS + 1));
        let err = p.temporal_analysis(&parcel(), too_long, 0.1).await.unwrap_err();
        assert!(matches!(err, BloomError::InvalidRange(_)));

        // exactly three years reaches the data in early 2024
        let longest = DateRange::new(start, start + Duration::days(MAX_ANALYSIS_DAYS));
        let summary = p.temporal_analysis(&parcel(), longest, 0.1).await.unwrap();
        assert_eq!(summary.observations, 1);
    }

    #[tokio::test]
    async fn test_predict_uses_latest_record() {
        let p = pipeline(seasonal_source());
        let forecast = p.predict(&parcel(), date(2024, 4, 30)).await.unwrap();

        // latest composite Apr 22 has NDVI 0.3 -> 2 * 0.3 + 10 days
        assert_eq!(forecast.composite_date, date(2024, 4, 22));
        assert_eq!(forecast.current.timestamp, date(2024, 4, 30));
        assert_relative_eq!(forecast.prediction.days_until_bloom, 10.6, epsilon = 1e-9);
        assert_eq!(forecast.prediction.prediction_date, Some(date(2024, 5, 10)));
        assert!(forecast.narrative.is_fallback());
        assert_relative_eq!(forecast.parcel.area_hectares, 123.921_424, max_relative = 1e-6);
    }

    #[tokio::test]
    async fn test_predict_with_missing_aligned_lst() {
        let streams = synthetic_streams(date(2024, 1, 1), 12, &[0.2, 0.3, 0.5, 0.3, 0.2, 0.6]);
        let mut samples = streams.vegetation;
        // no LST composite starts between Apr 22 and Apr 30
        samples.extend(
            streams
                .lst
                .into_iter()
                .filter(|s| s.timestamp < date(2024, 4, 22) || s.timestamp > date(2024, 4, 30)),
        );
        samples.extend(streams.precipitation);
        samples.extend(streams.evapotranspiration);
        samples.push(
            crate::data::EnvironmentalSample::new(date(2024, 4, 27), SourceKind::Precipitation)
                .with_band(crate::data::bands::PRECIPITATION, Some(10.0)),
        );
        let p = pipeline(InMemorySource::new(samples));

        let forecast = p.predict(&parcel(), date(2024, 4, 30)).await.unwrap();
        assert_eq!(forecast.current.lst_day, Some(300.0));
        // rain window [Apr 23, Apr 30) ends at the reference date
        assert_relative_eq!(forecast.current.precip_7d.unwrap(), 24.0);
        assert_relative_eq!(forecast.prediction.days_until_bloom, 10.6, epsilon = 1e-9);
    }
}
