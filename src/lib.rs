//! Bloom Predictor Rust Implementation
//!
//! Predicts days until flowering onset for a parcel from satellite
//! vegetation-index, land-surface-temperature, precipitation and
//! evapotranspiration time series.
//!
//! - `features/`: Per-date feature records, trailing windows, stream alignment, table I/O
//! - `peaks/`: Bloom-period detection and temporal summaries
//! - `assembler`, `transform`, `model`, `engine`: Inference contract
//! - `narrative/`: External and rule-based explanations
//! - `pipeline`: Parcel-level orchestration over injected collaborators
//!
//! Build the HTTP server with `--features api`.

pub mod error;
pub mod data;
pub mod features;
pub mod peaks;
pub mod assembler;
pub mod transform;
pub mod model;
pub mod engine;
pub mod narrative;
pub mod geometry;
pub mod source;
pub mod pipeline;
pub mod config;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use error::{BloomError, BloomResult, FailureKind};
pub use data::{bands, DateRange, EnvironmentalSample, SourceKind};
pub use features::{
    build_series, default_schema, BuildInputs, BuilderConfig, FeatureLookup, FeatureRecord,
    FeatureRow, FeatureSeries, Hemisphere, NdviHistory, RollingPolicy, SampleStreams, Season,
    TimeSeriesFeatureBuilder, WindowSums, FEATURE_COLUMNS,
};
pub use peaks::{detect, detect_optional, BloomPeriod, PeakDetector, TemporalSummary};
pub use assembler::FeatureVectorAssembler;
pub use transform::PowerTransform;
pub use model::{Activation, DenseLayer, RegressionModel};
pub use engine::{ArtifactBundle, ArtifactPaths, BundleLoader, PredictionEngine, PredictionResult};
pub use narrative::{
    AlertColor, BloomStage, ChatCompletionClient, Narrative, NarrativeAnalysis, NarrativeContext,
    NarrativeFallbackGenerator, NarrativeGenerator, NarrativeService,
};
pub use geometry::{BoundingBox, Parcel};
pub use source::{CsvSampleSource, GeospatialSource, InMemorySource};
pub use pipeline::{BloomForecast, BloomPipeline, ParcelSummary};
pub use config::{NarrativeConfig, PredictorConfig};

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
