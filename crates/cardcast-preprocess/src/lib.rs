//! cardcast‑preprocess – detection histories → fixed-length center windows.

use cardcast_history::{CenterPoint, Detection};
use ndarray::{s, Array2, Array3, ArrayView2};
use std::path::PathBuf;
use thiserror::Error;

pub mod scaler;
pub use scaler::{FeatureBounds, ScalerPair};

/// Features per window point: `cx`, `cy`.
pub const CENTER_FEATURES: usize = 2;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Cannot build a window from an empty detection history")]
    EmptyHistory,
    #[error("Sequence length must be at least 1")]
    InvalidSequenceLength,
    #[error("Feature bounds mismatch: expected {expected} features, scaler has min={min} max={max}")]
    FeatureCountMismatch { expected: usize, min: usize, max: usize },
    #[error("Feature {index} has an empty range (min={min}, max={max})")]
    DegenerateBounds { index: usize, min: f32, max: f32 },
    #[error("Failed to read scaler {path:?}: {source}")]
    ScalerIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse scaler: {0}")]
    ScalerJson(#[from] serde_json::Error),
}

impl PreprocessError {
    /// True for errors caused by bad lengths or bounds rather than bad data.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, PreprocessError::EmptyHistory)
    }
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// A `(sequence_length, 2)` buffer of center points, oldest row first.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    points: Array2<f32>,
}

impl SequenceWindow {
    fn from_centers(centers: impl ExactSizeIterator<Item = CenterPoint>) -> Self {
        let len = centers.len();
        let mut points = Array2::<f32>::zeros((len, CENTER_FEATURES));
        for (mut row, c) in points.outer_iter_mut().zip(centers) {
            row[0] = c.cx;
            row[1] = c.cy;
        }
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.points.view()
    }

    pub fn centers(&self) -> Vec<CenterPoint> {
        self.points
            .outer_iter()
            .map(|row| CenterPoint::new(row[0], row[1]))
            .collect()
    }

    /// Drop the oldest point and append `next`, keeping the length fixed.
    pub fn advance(&mut self, next: CenterPoint) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let tail = self.points.slice(s![1.., ..]).to_owned();
        self.points.slice_mut(s![..len - 1, ..]).assign(&tail);
        self.points[[len - 1, 0]] = next.cx;
        self.points[[len - 1, 1]] = next.cy;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder {
    sequence_length: usize,
}

impl SequenceBuilder {
    /// Create a builder that emits windows of `sequence_length` points.
    pub fn new(sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(PreprocessError::InvalidSequenceLength);
        }
        Ok(Self { sequence_length })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Most recent `sequence_length` centers; short histories are left-padded
    /// with their first center.
    pub fn build(&self, history: &[Detection]) -> Result<SequenceWindow> {
        let first = history.first().ok_or(PreprocessError::EmptyHistory)?;
        let pad = self.sequence_length.saturating_sub(history.len());
        let recent = &history[history.len().saturating_sub(self.sequence_length)..];

        let centers = std::iter::repeat(first.center())
            .take(pad)
            .chain(recent.iter().map(Detection::center))
            .collect::<Vec<_>>();
        Ok(SequenceWindow::from_centers(centers.into_iter()))
    }

    /// Every overlapping window over the whole (padded) history, as a
    /// `(windows, sequence_length, 2)` batch, oldest window first.
    pub fn sliding_windows(&self, history: &[Detection]) -> Result<Array3<f32>> {
        let first = history.first().ok_or(PreprocessError::EmptyHistory)?;
        let pad = self.sequence_length.saturating_sub(history.len());
        let centers = std::iter::repeat(first.center())
            .take(pad)
            .chain(history.iter().map(Detection::center))
            .collect::<Vec<_>>();

        let windows = centers.len() - self.sequence_length + 1;
        let mut batch = Array3::<f32>::zeros((windows, self.sequence_length, CENTER_FEATURES));
        for w in 0..windows {
            for (j, c) in centers[w..w + self.sequence_length].iter().enumerate() {
                batch[(w, j, 0)] = c.cx;
                batch[(w, j, 1)] = c.cy;
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(i: f32) -> Detection {
        // center (2i + 1, 2i + 1)
        Detection::new(2.0 * i, 2.0 * i, 2.0 * i + 2.0, 2.0 * i + 2.0, 0.9)
    }

    #[test]
    fn pads_single_detection() {
        let window = SequenceBuilder::new(5)
            .unwrap()
            .build(&[Detection::new(0.0, 0.0, 2.0, 2.0, 0.9)])
            .unwrap();
        assert_eq!(window.centers(), vec![CenterPoint::new(1.0, 1.0); 5]);
    }

    #[test]
    fn left_pads_with_first_center() {
        let history: Vec<_> = (0..3).map(|i| square(i as f32)).collect();
        let window = SequenceBuilder::new(5).unwrap().build(&history).unwrap();
        let cx: Vec<f32> = window.centers().iter().map(|c| c.cx).collect();
        assert_eq!(cx, vec![1.0, 1.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn keeps_most_recent_points() {
        let history: Vec<_> = (0..8).map(|i| square(i as f32)).collect();
        let window = SequenceBuilder::new(5).unwrap().build(&history).unwrap();
        let expected: Vec<_> = history[3..].iter().map(Detection::center).collect();
        assert_eq!(window.centers(), expected);
    }

    #[test]
    fn exact_length_is_unchanged() {
        let history: Vec<_> = (0..5).map(|i| square(i as f32)).collect();
        let window = SequenceBuilder::new(5).unwrap().build(&history).unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window.centers()[0], CenterPoint::new(1.0, 1.0));
    }

    #[test]
    fn empty_history_is_an_error() {
        let err = SequenceBuilder::new(5).unwrap().build(&[]).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyHistory));
        assert!(!err.is_configuration());
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(matches!(SequenceBuilder::new(0), Err(PreprocessError::InvalidSequenceLength)));
    }

    #[test]
    fn advance_rolls_window() {
        let history: Vec<_> = (0..3).map(|i| square(i as f32)).collect();
        let mut window = SequenceBuilder::new(3).unwrap().build(&history).unwrap();
        window.advance(CenterPoint::new(9.0, 10.0));
        assert_eq!(
            window.centers(),
            vec![CenterPoint::new(3.0, 3.0), CenterPoint::new(5.0, 5.0), CenterPoint::new(9.0, 10.0)]
        );
    }

    #[test]
    fn sliding_windows_cover_history() {
        let history: Vec<_> = (0..6).map(|i| square(i as f32)).collect();
        let batch = SequenceBuilder::new(4).unwrap().sliding_windows(&history).unwrap();
        assert_eq!(batch.shape(), &[3, 4, 2]);
        assert_eq!(batch[(0, 0, 0)], 1.0);
        assert_eq!(batch[(2, 3, 1)], 11.0);
    }
}
