// Axum API server module
//
// Purpose: HTTP surface over the bloom pipeline (point prediction, temporal
// analysis, direct feature-row prediction)

#[cfg(feature = "api")]
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

#[cfg(feature = "api")]
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[cfg(feature = "api")]
use moka::future::Cache;

#[cfg(feature = "api")]
use std::sync::Arc;

#[cfg(feature = "api")]
use std::time::Duration;

#[cfg(feature = "api")]
use chrono::NaiveDate;

#[cfg(feature = "api")]
use serde::Deserialize;

#[cfg(feature = "api")]
use crate::{
    BloomError, BloomPipeline, CsvSampleSource, ChatCompletionClient, DateRange, FailureKind,
    FeatureRow, NarrativeGenerator, Parcel, PredictionEngine, PredictorConfig,
    TimeSeriesFeatureBuilder,
};

// ============================================================================
// Application State
// ============================================================================

#[cfg(feature = "api")]
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<BloomPipeline>,
    pub config: Arc<PredictorConfig>,
    pub cache: Cache<String, serde_json::Value>,
}

#[cfg(feature = "api")]
impl AppState {
    pub async fn new(config: PredictorConfig) -> anyhow::Result<Self> {
        tracing::info!("Loading environmental samples...");
        let source = Arc::new(CsvSampleSource::load(&config.sample_file())?);

        tracing::info!("Configuring prediction engine (artifacts load on first request)...");
        let engine = Arc::new(PredictionEngine::new(
            config.artifact_paths(),
            config.artifact_load_timeout(),
        ));

        let narrator = match config.narrative.client_config() {
            Some(client_config) => {
                tracing::info!("Narrative service: {}", client_config.base_url);
                let client = ChatCompletionClient::new(client_config)?;
                NarrativeGenerator::new(Arc::new(client), config.narrative.timeout())
            }
            None => {
                tracing::warn!("NARRATIVE_URL not set, using rule-based narratives only");
                NarrativeGenerator::fallback_only()
            }
        };

        let pipeline = BloomPipeline::new(source, engine, narrator)
            .with_builder(TimeSeriesFeatureBuilder::new(config.builder_config()));

        Ok(Self::from_parts(pipeline, config))
    }

    /// State around an already wired pipeline
    pub fn from_parts(pipeline: BloomPipeline, config: PredictorConfig) -> Self {
        tracing::info!("Initializing Moka cache...");
        let cache = Cache::builder()
            .max_capacity(10_000) // 10K entries
            .time_to_live(Duration::from_secs(300)) // 5 min TTL
            .build();

        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            cache,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

#[cfg(feature = "api")]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/bloom/predict", post(predict_bloom))
        .route("/api/v1/bloom/predict-features", post(predict_features))
        .route("/api/v1/bloom/temporal", post(temporal_analysis))
        // Middleware (applied in reverse order)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Request Types
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub coordinates: Vec<Vec<f64>>,
    pub reference_date: Option<NaiveDate>,
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct FeaturePredictRequest {
    pub features: FeatureRow,
    pub reference_date: Option<NaiveDate>,
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct TemporalRequest {
    pub coordinates: Vec<Vec<f64>>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub threshold: Option<f64>,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

#[cfg(feature = "api")]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "model_loaded": state.pipeline.engine().is_ready(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(feature = "api")]
fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

#[cfg(feature = "api")]
async fn predict_bloom(
    State(state): State<AppState>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let parcel = Parcel::from_points(&payload.coordinates)?;
    let reference = payload.reference_date.unwrap_or_else(today);

    tracing::debug!("Predicting bloom for parcel centred at {:?}", parcel.centroid());
    let forecast = state.pipeline.predict(&parcel, reference).await?;

    Ok(Json(serde_json::json!({
        "polygon": parcel.coordinates(),
        "forecast": forecast,
    })))
}

#[cfg(feature = "api")]
async fn predict_features(
    State(state): State<AppState>,
    Json(payload): Json<FeaturePredictRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reference = payload.reference_date.unwrap_or_else(today);
    let prediction = state
        .pipeline
        .engine()
        .predict_result(&payload.features, reference)
        .await?;

    Ok(Json(serde_json::json!({ "prediction": prediction })))
}

#[cfg(feature = "api")]
async fn temporal_analysis(
    State(state): State<AppState>,
    Json(payload): Json<TemporalRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let parcel = Parcel::from_points(&payload.coordinates)?;
    let threshold = payload.threshold.unwrap_or(state.config.peak_threshold);

    let cache_key = format!(
        "temporal:{:?}:{}:{}:{}",
        parcel.coordinates(),
        payload.start_date,
        payload.end_date,
        threshold
    );
    if let Some(cached) = state.cache.get(&cache_key).await {
        tracing::debug!("Cache hit: {}", cache_key);
        return Ok(Json(cached));
    }

    let range = DateRange::new(payload.start_date, payload.end_date);
    let summary = state.pipeline.temporal_analysis(&parcel, range, threshold).await?;

    let result = serde_json::json!({
        "start_date": payload.start_date,
        "end_date": payload.end_date,
        "threshold": threshold,
        "summary": summary,
    });

    state.cache.insert(cache_key, result.clone()).await;

    Ok(Json(result))
}

// ============================================================================
// Error Handling
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unprocessable(String),
    Unavailable(String),
    Internal(String),
}

#[cfg(feature = "api")]
impl From<BloomError> for AppError {
    fn from(err: BloomError) -> Self {
        let message = err.to_string();
        match (err.kind(), &err) {
            (FailureKind::FixInput, BloomError::InvalidParcel(_) | BloomError::InvalidRange(_)) => {
                AppError::BadRequest(message)
            }
            (FailureKind::FixInput, _) => AppError::Unprocessable(message),
            (FailureKind::TryAgainLater, _) => AppError::Unavailable(message),
            (FailureKind::Defect, _) => {
                tracing::error!("{}", message);
                AppError::Internal(message)
            }
        }
    }
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
