//! Prediction engine
//!
//! Owns the trained artifact bundle behind a once-initialized cell. The
//! first request triggers loading; concurrent first requests wait on the same
//! load. A failed load leaves the cell empty so the next request retries.
//! A load that outlives the timeout keeps running; the next request waits on
//! that same task instead of starting another one.

use crate::assembler::FeatureVectorAssembler;
use crate::error::{BloomError, BloomResult};
use crate::features::record::{default_schema, FeatureLookup, FeatureRecord, FeatureSeries};
use crate::model::RegressionModel;
use crate::narrative::types::{AlertColor, BloomStage};
use crate::transform::PowerTransform;
use chrono::{Duration as ChronoDuration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

// ============================================================================
// Artifacts
// ============================================================================

/// File locations of one trained bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub input_transform: PathBuf,
    pub output_transform: PathBuf,
    /// Ordered column list; the canonical schema when absent
    pub columns: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join("model.json"),
            input_transform: dir.join("pt_x.json"),
            output_transform: dir.join("pt_y.json"),
            columns: Some(dir.join("columns.json")),
        }
    }
}

/// Model, paired transforms and the column order they were fitted on
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    model: RegressionModel,
    input_transform: PowerTransform,
    output_transform: PowerTransform,
    columns: Vec<String>,
}

impl ArtifactBundle {
    pub fn new(
        model: RegressionModel,
        input_transform: PowerTransform,
        output_transform: PowerTransform,
        columns: Vec<String>,
    ) -> BloomResult<Self> {
        if model.input_dim != columns.len() || input_transform.dim() != columns.len() {
            return Err(BloomError::Model(format!(
                "{} columns, model expects {} inputs, input transform has {} lambdas",
                columns.len(),
                model.input_dim,
                input_transform.dim()
            )));
        }
        if output_transform.dim() != 1 {
            return Err(BloomError::Model(format!(
                "output transform must be one-dimensional, has {} lambdas",
                output_transform.dim()
            )));
        }
        Ok(Self {
            model,
            input_transform,
            output_transform,
            columns,
        })
    }

    /// Blocking load from disk
    pub fn load(paths: &ArtifactPaths) -> BloomResult<Self> {
        let model = RegressionModel::load(&paths.model)?;
        let input_transform = PowerTransform::load(&paths.input_transform)?;
        let output_transform = PowerTransform::load(&paths.output_transform)?;

        let columns = match &paths.columns {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path).map_err(|e| BloomError::ArtifactLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                serde_json::from_str::<Vec<String>>(&text).map_err(|e| BloomError::ArtifactLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            _ => default_schema(),
        };

        Self::new(model, input_transform, output_transform, columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Assemble, validate, transform, forward, inverse-transform.
    ///
    /// The result is returned unclamped. A non-finite result (the inverse
    /// transform left its domain) is a `Model` error.
    pub fn predict<R: FeatureLookup + ?Sized>(&self, record: &R) -> BloomResult<f64> {
        let vector = FeatureVectorAssembler::assemble(record, &self.columns)?;
        let dense = FeatureVectorAssembler::require_complete(&vector, &self.columns)?;
        let scaled = self.input_transform.transform(&dense)?;
        let raw = self.model.predict(&scaled)?;
        let days = self.output_transform.inverse_scalar(raw)?;
        if !days.is_finite() {
            return Err(BloomError::Model(format!(
                "inverse transform of model output {} is not finite ({})",
                raw, days
            )));
        }
        Ok(days)
    }
}

/// Loads a bundle; runs on the blocking pool
pub trait BundleLoader: Send + Sync {
    fn load_bundle(&self) -> BloomResult<ArtifactBundle>;
}

impl BundleLoader for ArtifactPaths {
    fn load_bundle(&self) -> BloomResult<ArtifactBundle> {
        ArtifactBundle::load(self)
    }
}

// ============================================================================
// Prediction result
// ============================================================================

/// Days-until-bloom plus its presentation bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Model output, unclamped
    pub days_until_bloom: f64,
    pub stage: BloomStage,
    /// Percentage
    pub probability: u8,
    pub status: String,
    pub color: AlertColor,
    /// `reference + floor(days)`; `None` when the offset is not representable
    pub prediction_date: Option<NaiveDate>,
}

impl PredictionResult {
    pub fn from_days(days_until_bloom: f64, reference: NaiveDate) -> Self {
        let whole = whole_days(days_until_bloom);
        let stage = BloomStage::for_days(whole);
        let prediction_date = if days_until_bloom.is_finite() {
            ChronoDuration::try_days(whole).and_then(|d| reference.checked_add_signed(d))
        } else {
            None
        };

        Self {
            days_until_bloom,
            stage,
            probability: stage.probability(),
            status: stage.status_label().to_string(),
            color: stage.color(),
            prediction_date,
        }
    }

    pub fn whole_days(&self) -> i64 {
        whole_days(self.days_until_bloom)
    }
}

/// Floor to whole days, toward the past for negative outputs (saturating;
/// NaN maps to 0)
fn whole_days(days: f64) -> i64 {
    days.floor() as i64
}

// ============================================================================
// Engine
// ============================================================================

type LoadTask = JoinHandle<BloomResult<ArtifactBundle>>;

pub struct PredictionEngine {
    loader: Arc<dyn BundleLoader>,
    bundle: OnceCell<Arc<ArtifactBundle>>,
    /// Load task that timed out while still running
    in_flight: Mutex<Option<LoadTask>>,
    load_timeout: Duration,
}

impl PredictionEngine {
    /// Engine that loads from `paths` on first use
    pub fn new(paths: ArtifactPaths, load_timeout: Duration) -> Self {
        Self::with_loader(Arc::new(paths), load_timeout)
    }

    pub fn with_loader(loader: Arc<dyn BundleLoader>, load_timeout: Duration) -> Self {
        Self {
            loader,
            bundle: OnceCell::new(),
            in_flight: Mutex::new(None),
            load_timeout,
        }
    }

    /// Engine around an already loaded bundle
    pub fn from_bundle(bundle: ArtifactBundle) -> Self {
        let bundle = Arc::new(bundle);
        Self {
            loader: Arc::new(Preloaded(Arc::clone(&bundle))),
            bundle: OnceCell::new_with(Some(bundle)),
            in_flight: Mutex::new(None),
            load_timeout: Duration::from_secs(0),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.initialized()
    }

    /// Load the bundle if needed and return it
    pub async fn ensure_loaded(&self) -> BloomResult<Arc<ArtifactBundle>> {
        let bundle = self
            .bundle
            .get_or_try_init(|| async {
                tracing::info!("Loading model artifacts...");
                let start = Instant::now();

                let mut task = match self.take_in_flight() {
                    Some(task) => {
                        tracing::info!("Resuming artifact load still in progress");
                        task
                    }
                    None => {
                        let loader = Arc::clone(&self.loader);
                        tokio::task::spawn_blocking(move || loader.load_bundle())
                    }
                };

                let outcome = tokio::time::timeout(self.load_timeout, &mut task).await;
                let bundle = match outcome {
                    Ok(Ok(result)) => result?,
                    Ok(Err(join_error)) => {
                        return Err(BloomError::Model(format!("artifact loader aborted: {}", join_error)));
                    }
                    Err(_) => {
                        self.park_in_flight(task);
                        return Err(BloomError::ArtifactLoadTimeout(self.load_timeout));
                    }
                };

                tracing::info!(
                    "Model artifacts loaded in {:.3}s ({} columns)",
                    start.elapsed().as_secs_f64(),
                    bundle.columns().len()
                );
                Ok(Arc::new(bundle))
            })
            .await;

        match bundle {
            Ok(bundle) => Ok(Arc::clone(bundle)),
            Err(e) => {
                tracing::warn!("Model artifacts unavailable: {}", e);
                Err(e)
            }
        }
    }

    fn take_in_flight(&self) -> Option<LoadTask> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn park_in_flight(&self, task: LoadTask) {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);
    }

    /// Predict days until bloom for one record
    pub async fn predict<R: FeatureLookup + ?Sized>(&self, record: &R) -> BloomResult<f64> {
        let bundle = self.ensure_loaded().await?;
        bundle.predict(record)
    }

    /// Prediction plus outlook bucket, dated from `reference`
    pub async fn predict_result<R: FeatureLookup + ?Sized>(
        &self,
        record: &R,
        reference: NaiveDate,
    ) -> BloomResult<PredictionResult> {
        let days = self.predict(record).await?;
        Ok(PredictionResult::from_days(days, reference))
    }

    /// Batch inference over a series, one result per record
    pub async fn predict_series(&self, series: &FeatureSeries) -> BloomResult<Vec<BloomResult<f64>>> {
        let bundle = self.ensure_loaded().await?;
        let records: &[FeatureRecord] = series.records();
        Ok(records.par_iter().map(|r| bundle.predict(r)).collect())
    }
}

struct Preloaded(Arc<ArtifactBundle>);

impl BundleLoader for Preloaded {
    fn load_bundle(&self) -> BloomResult<ArtifactBundle> {
        Ok(self.0.as_ref().clone())
    }
}
