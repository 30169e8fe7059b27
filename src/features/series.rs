//! Align raw sample streams on the vegetation-index cadence
//!
//! Every vegetation composite date becomes one feature record. The LST and ET
//! composites attached to a date are the first ones starting inside that
//! product's composite period; precipitation and ET sums come from the full
//! trailing windows.

use crate::data::{bands, EnvironmentalSample, SourceKind};
use crate::error::{BloomError, BloomResult};
use crate::features::builder::{BuildInputs, NdviHistory, TimeSeriesFeatureBuilder};
use crate::features::record::{FeatureRecord, FeatureSeries};
use crate::features::windows::WindowSums;
use chrono::{Duration, NaiveDate};

/// Samples for one parcel, split by product
#[derive(Debug, Clone, Default)]
pub struct SampleStreams {
    pub vegetation: Vec<EnvironmentalSample>,
    pub lst: Vec<EnvironmentalSample>,
    pub precipitation: Vec<EnvironmentalSample>,
    pub evapotranspiration: Vec<EnvironmentalSample>,
}

impl SampleStreams {
    /// Split a mixed stream by `source_kind` and sort each by date
    pub fn from_samples(samples: impl IntoIterator<Item = EnvironmentalSample>) -> Self {
        let mut streams = Self::default();
        for sample in samples {
            streams.push(sample);
        }
        streams.sort();
        streams
    }

    pub fn push(&mut self, sample: EnvironmentalSample) {
        match sample.source_kind {
            SourceKind::VegetationIndex => self.vegetation.push(sample),
            SourceKind::LandSurfaceTemp => self.lst.push(sample),
            SourceKind::Precipitation => self.precipitation.push(sample),
            SourceKind::Evapotranspiration => self.evapotranspiration.push(sample),
        }
    }

    pub fn sort(&mut self) {
        for stream in [
            &mut self.vegetation,
            &mut self.lst,
            &mut self.precipitation,
            &mut self.evapotranspiration,
        ] {
            stream.sort_by_key(|s| s.timestamp);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vegetation.is_empty()
    }
}

/// First sample of `stream` starting in `[t, t + period)`
fn composite_for(stream: &[EnvironmentalSample], t: NaiveDate, kind: SourceKind) -> Option<&EnvironmentalSample> {
    let end = t + Duration::days(kind.composite_days());
    stream.iter().find(|s| s.timestamp >= t && s.timestamp < end)
}

/// Look-back for the evapotranspiration composite of current conditions
pub const CURRENT_ET_DAYS: i64 = 30;

/// Latest sample of `stream` inside `[from, until]` with `band` observed
fn latest_observed<'a>(
    stream: &'a [EnvironmentalSample],
    from: NaiveDate,
    until: NaiveDate,
    band: &str,
) -> Option<&'a EnvironmentalSample> {
    stream
        .iter()
        .filter(|s| s.timestamp >= from && s.timestamp <= until && s.band(band).is_some())
        .max_by_key(|s| s.timestamp)
}

/// Conditions as of `reference`, plus the date of the vegetation composite used.
///
/// NDVI and EVI come from the latest composite on or before `reference`; the
/// earlier composites in `streams` feed `NDVI_change` and the rolling mean.
/// LST is the latest observed composite, ET the latest observed one within
/// `CURRENT_ET_DAYS`, and every precipitation/ET window ends at `reference`.
/// Calendar features describe `reference`.
pub fn build_current(
    builder: &TimeSeriesFeatureBuilder,
    streams: &SampleStreams,
    reference: NaiveDate,
) -> BloomResult<(FeatureRecord, NaiveDate)> {
    let mut vegetation: Vec<&EnvironmentalSample> =
        streams.vegetation.iter().filter(|s| s.timestamp <= reference).collect();
    vegetation.sort_by_key(|s| s.timestamp);
    vegetation.dedup_by_key(|s| s.timestamp);

    let Some((latest, earlier)) = vegetation.split_last() else {
        return Err(BloomError::InsufficientHistory(format!(
            "no vegetation composite on or before {}",
            reference
        )));
    };

    let mut history = NdviHistory::new();
    for veg in earlier {
        let inputs = BuildInputs {
            vegetation: Some(*veg),
            ..Default::default()
        };
        builder.build(veg.timestamp, &inputs, &mut history)?;
    }

    let inputs = BuildInputs {
        vegetation: Some(*latest),
        lst: latest_observed(&streams.lst, NaiveDate::MIN, reference, bands::LST_DAY),
        et_composite: latest_observed(
            &streams.evapotranspiration,
            reference - Duration::days(CURRENT_ET_DAYS),
            reference,
            bands::ET,
        ),
        precip_sums: WindowSums::from_samples(reference, &streams.precipitation, bands::PRECIPITATION),
        et_sums: WindowSums::from_samples(reference, &streams.evapotranspiration, bands::ET),
    };
    let record = builder.build(reference, &inputs, &mut history)?;

    tracing::debug!(
        "Current conditions at {} from vegetation composite {}",
        reference,
        latest.timestamp
    );

    Ok((record, latest.timestamp))
}

/// Build the feature series for one parcel.
///
/// Vegetation composites sharing a date are collapsed to the first one so the
/// resulting series is strictly increasing.
pub fn build_series(builder: &TimeSeriesFeatureBuilder, streams: &SampleStreams) -> BloomResult<FeatureSeries> {
    let mut vegetation: Vec<&EnvironmentalSample> = streams.vegetation.iter().collect();
    vegetation.sort_by_key(|s| s.timestamp);
    vegetation.dedup_by_key(|s| s.timestamp);

    let mut history = NdviHistory::new();
    let mut series = FeatureSeries::default();

    for veg in vegetation {
        let t = veg.timestamp;
        let inputs = BuildInputs {
            vegetation: Some(veg),
            lst: composite_for(&streams.lst, t, SourceKind::LandSurfaceTemp),
            et_composite: composite_for(&streams.evapotranspiration, t, SourceKind::Evapotranspiration),
            precip_sums: WindowSums::from_samples(t, &streams.precipitation, bands::PRECIPITATION),
            et_sums: WindowSums::from_samples(t, &streams.evapotranspiration, bands::ET),
        };
        let record = builder.build(t, &inputs, &mut history)?;
        series.push_unchecked(record);
    }

    tracing::debug!(
        "Built feature series: {} records from {} LST, {} precipitation, {} ET samples",
        series.len(),
        streams.lst.len(),
        streams.precipitation.len(),
        streams.evapotranspiration.len()
    );

    Ok(series)
}
