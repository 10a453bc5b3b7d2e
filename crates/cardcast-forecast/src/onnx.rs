//! ONNX Runtime backend for [`Predictor`].

use crate::{ForecastError, Predictor, Result};
use cardcast_model::ModelConfig;
use log::debug;
use ndarray::ArrayView3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// LSTM coordinate regressor: `(1, L, F)` window in, next point out.
pub struct OrtLstm {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OrtLstm {
    /// Load and optimize the ONNX model, preparing it for inference.
    pub fn new(model_path: &Path, input_name: &str, output_name: &str) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;
        debug!("loaded trajectory model {:?}", model_path);

        Ok(Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(&config.model_path, &config.input_name, &config.output_name)
    }
}

impl Predictor for OrtLstm {
    fn predict(&self, window: ArrayView3<f32>) -> Result<Vec<f32>> {
        let shape = [window.shape()[0], window.shape()[1], window.shape()[2]];
        let data: Vec<f32> = window.iter().copied().collect();
        let tensor = Tensor::from_array((shape, data))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ForecastError::PredictionUnavailable("model session poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let value = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ForecastError::PredictionUnavailable(format!("model has no output {:?}", self.output_name))
        })?;
        let (_, values) = value.try_extract_tensor::<f32>()?;
        Ok(values.to_vec())
    }
}
