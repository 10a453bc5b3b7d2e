//! # cardcast-model
//!
//! Configuration for the trajectory predictor used by the forecasting stage.
//! A [`ModelConfig`] names which predictor to run, where its ONNX file and
//! min-max scalers live, and the shape contract around it (window length,
//! feature counts, forecast horizon).  Nothing here is global: callers load a
//! config and pass it to the pipeline explicitly.
//!
//! ## Features
//!
//! - JSON-backed [`ModelConfig`] with sensible defaults
//! - Explicit [`PredictorKind`] selection
//! - Scaler loading via `cardcast-preprocess`
//! - ONNX model validation (tensor names) through ONNX Runtime

use anyhow::{bail, Context, Result};
use cardcast_preprocess::{ScalerPair, CENTER_FEATURES};
use log::debug;
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the default models directory path
pub fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

/// Supported predictor backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// LSTM coordinate regressor exported to ONNX
    #[default]
    LstmCoord,
}

/// Configuration for one forecasting predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Which predictor implementation to build
    pub predictor: PredictorKind,
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Name of the model's input tensor
    pub input_name: String,
    /// Name of the model's output tensor
    pub output_name: String,
    /// Points per input window
    pub sequence_length: usize,
    /// Values per window point
    pub input_features: usize,
    /// Values the predictor emits per step
    pub output_features: usize,
    /// Autoregressive iterations per prediction run
    pub horizon: usize,
    /// Min-max bounds for predictor inputs
    pub scaler_x: PathBuf,
    /// Min-max bounds for predictor outputs
    pub scaler_y: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let dir = default_models_dir();
        Self {
            predictor: PredictorKind::LstmCoord,
            model_path: dir.join("lstm_coord_0914_int8.onnx"),
            input_name: "input_2".to_string(),
            output_name: "Identity".to_string(),
            sequence_length: 5,
            input_features: 2,
            output_features: 2,
            horizon: 10,
            scaler_x: dir.join("scaler_X.json"),
            scaler_y: dir.join("scaler_y.json"),
        }
    }
}

impl ModelConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config: {:?}", path))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse model config: {:?}", path))?;
        config.validate()?;
        debug!("loaded model config {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Reject shapes the forecasting loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            bail!("sequence_length must be at least 1");
        }
        if self.input_features != CENTER_FEATURES {
            bail!(
                "input_features must be {CENTER_FEATURES} (cx, cy), got {}",
                self.input_features
            );
        }
        if self.output_features < 2 {
            bail!("output_features must cover cx and cy, got {}", self.output_features);
        }
        if self.horizon < 2 {
            bail!("horizon must be at least 2 to split warm-up and scored steps, got {}", self.horizon);
        }
        Ok(())
    }

    /// Load and check both scalers against the configured feature counts
    pub fn load_scalers(&self) -> Result<ScalerPair> {
        let scalers = ScalerPair::load(&self.scaler_x, &self.scaler_y)
            .context("Failed to load feature scalers")?;
        scalers
            .validate(self.input_features, self.output_features)
            .context("Feature scalers do not match model config")?;
        Ok(scalers)
    }

    /// Resolve relative paths against `base` (usually the config file's directory)
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [&mut self.model_path, &mut self.scaler_x, &mut self.scaler_y] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

/// Open an ONNX model and check it exposes the expected input and output tensors
pub fn validate_onnx_model(model_path: &Path, input_name: &str, output_name: &str) -> Result<()> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to open ONNX model: {:?}", model_path))?;

    if !session.inputs.iter().any(|input| input.name == input_name) {
        bail!("Model {:?} has no input named {:?}", model_path, input_name);
    }
    if !session.outputs.iter().any(|output| output.name == output_name) {
        bail!("Model {:?} has no output named {:?}", model_path, output_name);
    }
    Ok(())
}
