//! Runtime configuration
//!
//! Read from environment variables (with defaults) or from a JSON file.

use crate::engine::ArtifactPaths;
use crate::features::builder::{BuilderConfig, RollingPolicy};
use crate::features::calendar::Hemisphere;
use crate::narrative::service::ChatClientConfig;
use crate::peaks::DEFAULT_RELATIVE_THRESHOLD;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Base URL of an OpenAI-compatible endpoint; no external narratives when unset
    pub url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            url: None,
            model: "meta-llama/llama-3.1-8b-instruct:free".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Client configuration, if a service URL is set
    pub fn client_config(&self) -> Option<ChatClientConfig> {
        let url = self.url.as_ref()?;
        let mut config = ChatClientConfig::new(url.clone(), self.model.clone());
        config.api_key = self.api_key.clone();
        config.timeout = self.timeout();
        Some(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub artifact_dir: PathBuf,
    pub model_file: String,
    pub input_transform_file: String,
    pub output_transform_file: String,
    pub columns_file: String,
    pub artifact_load_timeout_secs: u64,
    pub narrative: NarrativeConfig,
    pub rolling: RollingPolicy,
    pub hemisphere: Hemisphere,
    pub peak_threshold: f64,
    /// Directory holding `samples.csv`
    pub sample_dir: PathBuf,
    pub port: u16,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            model_file: "model.json".to_string(),
            input_transform_file: "pt_x.json".to_string(),
            output_transform_file: "pt_y.json".to_string(),
            columns_file: "columns.json".to_string(),
            artifact_load_timeout_secs: 30,
            narrative: NarrativeConfig::default(),
            rolling: RollingPolicy::default(),
            hemisphere: Hemisphere::default(),
            peak_threshold: DEFAULT_RELATIVE_THRESHOLD,
            sample_dir: PathBuf::from("data"),
            port: 3000,
        }
    }
}

impl PredictorConfig {
    /// Load from a JSON file; absent keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("ARTIFACT_LOAD_TIMEOUT_SECS") {
            config.artifact_load_timeout_secs = secs
                .parse()
                .with_context(|| format!("ARTIFACT_LOAD_TIMEOUT_SECS must be an integer, got '{}'", secs))?;
        }
        if let Some(url) = lookup("NARRATIVE_URL").filter(|u| !u.trim().is_empty()) {
            config.narrative.url = Some(url);
        }
        if let Some(model) = lookup("NARRATIVE_MODEL") {
            config.narrative.model = model;
        }
        if let Some(key) = lookup("NARRATIVE_API_KEY").filter(|k| !k.is_empty()) {
            config.narrative.api_key = Some(key);
        }
        if let Some(secs) = lookup("NARRATIVE_TIMEOUT_SECS") {
            config.narrative.timeout_secs = secs
                .parse()
                .with_context(|| format!("NARRATIVE_TIMEOUT_SECS must be an integer, got '{}'", secs))?;
        }
        if let Some(dir) = lookup("SAMPLE_DIR") {
            config.sample_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }
        if let Some(hemisphere) = lookup("HEMISPHERE") {
            config.hemisphere = match hemisphere.trim().to_lowercase().as_str() {
                "northern" | "north" | "n" => Hemisphere::Northern,
                "southern" | "south" | "s" => Hemisphere::Southern,
                other => anyhow::bail!("HEMISPHERE must be 'northern' or 'southern', got '{}'", other),
            };
        }
        if let Some(k) = lookup("PEAK_THRESHOLD") {
            config.peak_threshold = k
                .parse()
                .with_context(|| format!("PEAK_THRESHOLD must be a number, got '{}'", k))?;
        }

        Ok(config)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.artifact_dir.join(&self.model_file),
            input_transform: self.artifact_dir.join(&self.input_transform_file),
            output_transform: self.artifact_dir.join(&self.output_transform_file),
            columns: Some(self.artifact_dir.join(&self.columns_file)),
        }
    }

    pub fn artifact_load_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_load_timeout_secs)
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            rolling: self.rolling,
            hemisphere: self.hemisphere,
        }
    }

    pub fn sample_file(&self) -> PathBuf {
        self.sample_dir.join("samples.csv")
    }
}
