// cardcast-history/src/lib.rs
// ============================================================
// Detection history crate for cardcast
// Holds the per-label bounding boxes collected upstream and
// hands them to the forecasting stages as read-only slices.
// ------------------------------------------------------------
// Public API:
//   * Detection::center()        – box midpoint
//   * HistorySource::history()   – ordered boxes for one label
//   * DetectionStore             – JSON-backed HistorySource
// ------------------------------------------------------------
// Data notes
//   * Rows are [x_min, y_min, x_max, y_max, confidence].
//   * Insertion order == capture order (oldest first).
// ============================================================

//! cardcast – detection history layer
//!
//! A [`DetectionStore`] maps a class label (a card such as `"Tc"`) to the
//! boxes seen for it, oldest first.  Downstream crates only ever read
//! through the [`HistorySource`] trait, so any other store (a tracker, a
//! database) can be plugged in without touching the forecasting code.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read detections file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse detections: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Detection row must have 5 values [x_min, y_min, x_max, y_max, confidence], got {0}")]
    MalformedRow(usize),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Midpoint of a detection box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterPoint {
    pub cx: f32,
    pub cy: f32,
}

impl CenterPoint {
    pub fn new(cx: f32, cy: f32) -> Self {
        Self { cx, cy }
    }
}

/// One recognised object in one frame, in pixel coordinates.
///
/// Serialised as the flat row `[x_min, y_min, x_max, y_max, confidence]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "[f32; 5]")]
pub struct Detection {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub confidence: f32,
}

impl Detection {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32, confidence: f32) -> Self {
        Self { x_min, y_min, x_max, y_max, confidence }
    }

    /// Box midpoint; confidence and extents are dropped.
    pub fn center(&self) -> CenterPoint {
        CenterPoint {
            cx: (self.x_min + self.x_max) / 2.0,
            cy: (self.y_min + self.y_max) / 2.0,
        }
    }
}

impl TryFrom<Vec<f32>> for Detection {
    type Error = HistoryError;

    fn try_from(row: Vec<f32>) -> Result<Self> {
        match row.as_slice() {
            &[x_min, y_min, x_max, y_max, confidence] => {
                Ok(Self { x_min, y_min, x_max, y_max, confidence })
            }
            _ => Err(HistoryError::MalformedRow(row.len())),
        }
    }
}

impl From<Detection> for [f32; 5] {
    fn from(d: Detection) -> Self {
        [d.x_min, d.y_min, d.x_max, d.y_max, d.confidence]
    }
}

/// Read-only access to per-label detection histories.
pub trait HistorySource {
    /// Boxes for `label`, oldest first. `None` when the label was never seen.
    fn history(&self, label: &str) -> Option<&[Detection]>;
}

/// In-memory label → history map, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionStore {
    histories: BTreeMap<String, Vec<Detection>>,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"Tc": [[x1, y1, x2, y2, conf], ...], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let store: Self = serde_json::from_str(json)?;
        debug!("loaded detection histories for {} labels", store.histories.len());
        Ok(store)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Append the newest detection for `label`.
    pub fn push(&mut self, label: impl Into<String>, detection: Detection) {
        self.histories.entry(label.into()).or_default().push(detection);
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl HistorySource for DetectionStore {
    fn history(&self, label: &str) -> Option<&[Detection]> {
        self.histories.get(label).map(Vec::as_slice)
    }
}

impl FromIterator<(String, Vec<Detection>)> for DetectionStore {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Detection>)>>(iter: I) -> Self {
        Self { histories: iter.into_iter().collect() }
    }
}
