// cardcast-forecast/src/lib.rs
// ============================================================
// cardcast-forecast  –  Trajectory forecasting & ranking
// Rolls an LSTM coordinate regressor forward over a window of
// box centers and ranks card pairs by predicted vertical motion.
// ------------------------------------------------------------
// Pipeline: history → window → normalise → predict →
//           denormalise → roll window → … → rank pair
// ------------------------------------------------------------
// Public API
//   * OrtLstm::new(path, in, out)       – load ONNX predictor
//   * Predictor::predict(window)        – one step ahead
//   * Forecaster::forecast(window)      – N-step PredictionRun
//   * Ranker::rank(group, runs)         – vote on scored half
//   * RankingPipeline::evaluate_group() – all of the above
// ============================================================

//! cardcast – forecasting layer
//!
//! This crate provides a backend-agnostic [`Predictor`] trait plus a
//! concrete **`OrtLstm`** implementation that runs the trajectory model
//! through ONNX Runtime.  Switching to another engine means implementing
//! [`Predictor`]; the forecaster and ranker never see the backend.
//!
//! A predictor failure inside the autoregressive loop is not an error for
//! the caller: that iteration is skipped and the run comes back shorter,
//! which the [`Ranker`] then reports as a group with no result.

use cardcast_model::{ModelConfig, PredictorKind};
use cardcast_preprocess::PreprocessError;
use ndarray::ArrayView3;
use std::sync::Arc;
use thiserror::Error;

pub mod forecaster;
pub mod onnx;
pub mod pipeline;
pub mod ranker;

pub use forecaster::{ForecastStep, Forecaster, PredictionRun};
pub use onnx::OrtLstm;
pub use pipeline::{evaluate_groups_concurrently, GroupReport, RankingPipeline};
pub use ranker::{Comparison, Ranker, RankingGroup, RankingOutcome, Standings};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("No detections to build a window for {label:?}")]
    EmptyHistory { label: String },
    #[error("Prediction unavailable: {0}")]
    PredictionUnavailable(String),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Group evaluation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ForecastError {
    /// Attach `label` to window-building errors; everything else is configuration.
    pub fn from_preprocess(err: PreprocessError, label: &str) -> Self {
        if err.is_configuration() {
            ForecastError::Configuration(err.to_string())
        } else {
            ForecastError::EmptyHistory { label: label.to_string() }
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// One-step-ahead trajectory predictor.
pub trait Predictor: Send + Sync {
    /// `window` is normalised with shape `(1, sequence_length, features)`.
    /// Returns the next point in normalised output space, `cx` and `cy` first.
    fn predict(&self, window: ArrayView3<f32>) -> Result<Vec<f32>>;
}

/// Build the predictor named by `config.predictor`.
pub fn build_predictor(config: &ModelConfig) -> Result<Arc<dyn Predictor>> {
    match config.predictor {
        PredictorKind::LstmCoord => Ok(Arc::new(OrtLstm::from_config(config)?)),
    }
}
