//! Min-max feature scaling.
//!
//! Bounds are fit offline and shipped as small JSON documents of the form
//! `{"min": [...], "max": [...]}`, one for the predictor inputs and one for
//! its outputs.  A missing key loads as an empty vector, which then fails
//! [`FeatureBounds::validate`] instead of silently scaling nothing.

use crate::{PreprocessError, Result};
use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-feature `(min, max)` pair for one scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBounds {
    #[serde(default)]
    pub min: Vec<f32>,
    #[serde(default)]
    pub max: Vec<f32>,
}

impl FeatureBounds {
    pub fn new(min: Vec<f32>, max: Vec<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| PreprocessError::ScalerIo {
            path: path.to_path_buf(),
            source,
        })?;
        let bounds = Self::from_json_str(&json)?;
        debug!("loaded scaler {:?} ({} features)", path, bounds.min.len());
        Ok(bounds)
    }

    /// Check that both vectors hold `features` finite values and every range is positive.
    pub fn validate(&self, features: usize) -> Result<()> {
        if self.min.len() != features || self.max.len() != features {
            return Err(PreprocessError::FeatureCountMismatch {
                expected: features,
                min: self.min.len(),
                max: self.max.len(),
            });
        }
        for (index, (&min, &max)) in self.min.iter().zip(&self.max).enumerate() {
            // NaN fails this comparison too
            if !(max > min) || !min.is_finite() || !max.is_finite() {
                return Err(PreprocessError::DegenerateBounds { index, min, max });
            }
        }
        Ok(())
    }

    /// Scale every point of a `(len, features)` window into `[0, 1]` space.
    pub fn normalize(&self, window: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.validate(window.ncols())?;
        let (min, range) = self.min_and_range();
        Ok((&window - &min) / &range)
    }

    /// Same as [`normalize`](Self::normalize) over a `(batch, len, features)` tensor.
    pub fn normalize_batch(&self, batch: ArrayView3<f32>) -> Result<Array3<f32>> {
        self.validate(batch.shape()[2])?;
        let (min, range) = self.min_and_range();
        Ok((&batch - &min) / &range)
    }

    /// Map a flat predictor output back to coordinate space.
    pub fn denormalize(&self, values: &[f32]) -> Result<Vec<f32>> {
        self.validate(values.len())?;
        Ok(values
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(v, (min, max))| v * (max - min) + min)
            .collect())
    }

    fn min_and_range(&self) -> (Array1<f32>, Array1<f32>) {
        let min = Array1::from(self.min.clone());
        let range = Array1::from(self.max.clone()) - &min;
        (min, range)
    }
}

/// Input (`X`) and output (`y`) scalers used around one predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerPair {
    pub x: FeatureBounds,
    pub y: FeatureBounds,
}

impl ScalerPair {
    pub fn new(x: FeatureBounds, y: FeatureBounds) -> Self {
        Self { x, y }
    }

    pub fn load(x_path: &Path, y_path: &Path) -> Result<Self> {
        Ok(Self {
            x: FeatureBounds::from_json_file(x_path)?,
            y: FeatureBounds::from_json_file(y_path)?,
        })
    }

    pub fn validate(&self, input_features: usize, output_features: usize) -> Result<()> {
        self.x.validate(input_features)?;
        self.y.validate(output_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn unit_bounds() -> FeatureBounds {
        FeatureBounds::new(vec![0.0, 0.0], vec![10.0, 10.0])
    }

    #[test]
    fn normalize_midpoint() {
        let out = unit_bounds().normalize(array![[5.0, 5.0]].view()).unwrap();
        assert_eq!(out, array![[0.5, 0.5]]);
    }

    #[test]
    fn denormalize_midpoint() {
        let out = unit_bounds().denormalize(&[0.5, 0.5]).unwrap();
        assert_eq!(out, vec![5.0, 5.0]);
    }

    #[test]
    fn normalize_then_denormalize_is_identity() {
        let bounds = FeatureBounds::new(vec![500.0, 1000.0], vec![700.0, 1400.0]);
        let raw = array![[500.0, 1000.0], [576.5, 1183.5], [700.0, 1400.0], [612.25, 1301.0]];
        let scaled = bounds.normalize(raw.view()).unwrap();
        for (row, orig) in scaled.outer_iter().zip(raw.outer_iter()) {
            let back = bounds.denormalize(row.as_slice().unwrap()).unwrap();
            for (b, o) in back.iter().zip(orig.iter()) {
                assert!((b - o).abs() < 1e-3, "{b} vs {o}");
            }
        }
    }

    #[test]
    fn features_are_scaled_independently() {
        let bounds = FeatureBounds::new(vec![0.0, 100.0], vec![2.0, 300.0]);
        let out = bounds.normalize(array![[1.0, 150.0]].view()).unwrap();
        assert_eq!(out, array![[0.5, 0.25]]);
    }

    #[test]
    fn batch_matches_single_window() {
        let bounds = unit_bounds();
        let batch = Array3::from_shape_vec((2, 2, 2), vec![0.0, 10.0, 5.0, 5.0, 2.0, 4.0, 8.0, 6.0]).unwrap();
        let out = bounds.normalize_batch(batch.view()).unwrap();
        let second = bounds.normalize(batch.index_axis(ndarray::Axis(0), 1)).unwrap();
        assert_eq!(out.index_axis(ndarray::Axis(0), 1), second);
        assert_eq!(out[[0, 0, 1]], 1.0);
    }

    #[test]
    fn equal_bounds_are_rejected() {
        let bounds = FeatureBounds::new(vec![0.0, 3.0], vec![10.0, 3.0]);
        let err = bounds.normalize(array![[1.0, 3.0]].view()).unwrap_err();
        assert!(matches!(err, PreprocessError::DegenerateBounds { index: 1, .. }));
    }

    #[test]
    fn nan_bounds_are_rejected() {
        let bounds = FeatureBounds::new(vec![f32::NAN, 0.0], vec![10.0, 10.0]);
        assert!(matches!(bounds.validate(2), Err(PreprocessError::DegenerateBounds { index: 0, .. })));

        let bounds = FeatureBounds::new(vec![0.0, 0.0], vec![10.0, f32::NAN]);
        let err = bounds.normalize(array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, PreprocessError::DegenerateBounds { index: 1, .. }));
    }

    #[test]
    fn mismatched_lengths_fail_fast() {
        let bounds = FeatureBounds::new(vec![0.0], vec![10.0]);
        let err = bounds.normalize(array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, PreprocessError::FeatureCountMismatch { expected: 2, min: 1, max: 1 }));

        let err = unit_bounds().denormalize(&[0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(err, PreprocessError::FeatureCountMismatch { expected: 3, .. }));
    }

    #[test]
    fn missing_keys_load_empty_and_fail_validation() {
        let bounds = FeatureBounds::from_json_str(r#"{"min": [0.0, 0.0]}"#).unwrap();
        assert!(bounds.max.is_empty());
        assert!(bounds.validate(2).is_err());
    }
}
