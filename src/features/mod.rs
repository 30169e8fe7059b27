//! Feature derivation over multi-source environmental time series

pub mod calendar;
pub mod record;
pub mod windows;
pub mod builder;
pub mod series;
pub mod table;

pub use calendar::{CalendarFeatures, Hemisphere, Season};
pub use record::{
    default_schema, FeatureLookup, FeatureRecord, FeatureRow, FeatureSeries, FEATURE_COLUMNS,
    WINDOW_DAYS,
};
pub use windows::WindowSums;
pub use builder::{
    BuildInputs, BuilderConfig, NdviHistory, RollingPolicy, TimeSeriesFeatureBuilder,
    THERMAL_STRESS_LST_KELVIN,
};
pub use series::{build_series, SampleStreams};
pub use table::{read_csv_rows, series_to_dataframe, write_csv, write_parquet, TableRow};
