//! Autoregressive rollout of a [`Predictor`] over one class's window.

use crate::{ForecastError, Predictor, Result};
use cardcast_history::CenterPoint;
use cardcast_preprocess::{ScalerPair, SequenceWindow, CENTER_FEATURES};
use log::{debug, warn};
use ndarray::Axis;
use std::sync::Arc;

/// One denormalised predictor output.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastStep {
    /// Loop iteration that produced this step (skipped iterations leave gaps).
    pub iteration: usize,
    /// Full output vector; always at least `cx`, `cy`.
    pub values: Vec<f32>,
}

impl ForecastStep {
    pub fn center(&self) -> CenterPoint {
        CenterPoint::new(self.values[0], self.values[1])
    }
}

/// Steps collected for one label over a fixed number of iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRun {
    pub label: String,
    pub steps: Vec<ForecastStep>,
    /// Iterations where the predictor was unavailable.
    pub skipped: usize,
}

impl PredictionRun {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Forecaster {
    scalers: Arc<ScalerPair>,
    horizon: usize,
}

impl Forecaster {
    /// Check the scalers up front so no predictor call ever sees bad bounds.
    pub fn new(scalers: Arc<ScalerPair>, horizon: usize, output_features: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::Configuration("horizon must be at least 1".to_string()));
        }
        if output_features < 2 {
            return Err(ForecastError::Configuration(format!(
                "predictor must emit at least cx and cy, configured for {output_features}"
            )));
        }
        scalers
            .validate(CENTER_FEATURES, output_features)
            .map_err(|e| ForecastError::Configuration(e.to_string()))?;
        Ok(Self { scalers, horizon })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Run exactly `horizon` iterations, advancing `window` after every
    /// successful step. Failed iterations are logged and skipped.
    pub fn forecast(&self, label: &str, predictor: &dyn Predictor, mut window: SequenceWindow) -> PredictionRun {
        let mut steps = Vec::with_capacity(self.horizon);
        let mut skipped = 0;

        for iteration in 0..self.horizon {
            match self.step(predictor, &window) {
                Ok(values) => {
                    let step = ForecastStep { iteration, values };
                    window.advance(step.center());
                    debug!("{label} step {iteration}: {:?} → window {:?}", step.values, window.centers());
                    steps.push(step);
                }
                Err(err) => {
                    warn!("prediction failed for {label} at iteration {iteration}: {err}");
                    skipped += 1;
                }
            }
        }

        PredictionRun { label: label.to_string(), steps, skipped }
    }

    fn step(&self, predictor: &dyn Predictor, window: &SequenceWindow) -> Result<Vec<f32>> {
        let scaled = self
            .scalers
            .x
            .normalize(window.view())
            .map_err(|e| ForecastError::Configuration(e.to_string()))?
            .insert_axis(Axis(0));

        let raw = predictor.predict(scaled.view())?;
        if raw.len() < 2 {
            return Err(ForecastError::PredictionUnavailable(format!(
                "predictor returned {} values, need cx and cy",
                raw.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::PredictionUnavailable(format!("non-finite output {raw:?}")));
        }

        self.scalers
            .y
            .denormalize(&raw)
            .map_err(|e| ForecastError::PredictionUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{history, scalers, Drift, FailOdd, Fixed};
    use cardcast_preprocess::{FeatureBounds, SequenceBuilder};
    use std::sync::atomic::AtomicUsize;

    fn window(cx: f32, cy: f32) -> SequenceWindow {
        SequenceBuilder::new(5).unwrap().build(&history(cx, cy)).unwrap()
    }

    #[test]
    fn fixed_predictor_fills_horizon() {
        let forecaster = Forecaster::new(scalers(), 10, 2).unwrap();
        let run = forecaster.forecast("Tc", &Fixed(vec![0.5, 0.25]), window(100.0, 100.0));
        assert_eq!(run.len(), 10);
        assert_eq!(run.skipped, 0);
        assert!(run.steps.iter().all(|s| s.center() == CenterPoint::new(500.0, 250.0)));
        assert_eq!(run.steps[9].iteration, 9);
    }

    #[test]
    fn odd_failures_halve_the_run() {
        let forecaster = Forecaster::new(scalers(), 10, 2).unwrap();
        let predictor = FailOdd { calls: AtomicUsize::new(0) };
        let run = forecaster.forecast("Tc", &predictor, window(100.0, 100.0));
        assert_eq!(run.len(), 5);
        assert_eq!(run.skipped, 5);
        let iterations: Vec<_> = run.steps.iter().map(|s| s.iteration).collect();
        assert_eq!(iterations, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn window_rolls_forward_each_step() {
        // +0.01 normalised == +10 px per step on both axes
        let forecaster = Forecaster::new(scalers(), 3, 2).unwrap();
        let run = forecaster.forecast("Td", &Drift { dx: 0.01, dy: 0.02 }, window(100.0, 200.0));
        let cy: Vec<f32> = run.steps.iter().map(|s| s.center().cy).collect();
        for (got, want) in cy.iter().zip([220.0, 240.0, 260.0]) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
    }

    #[test]
    fn short_output_is_skipped() {
        let forecaster = Forecaster::new(scalers(), 4, 2).unwrap();
        let run = forecaster.forecast("9c", &Fixed(vec![0.5]), window(1.0, 1.0));
        assert!(run.is_empty());
        assert_eq!(run.skipped, 4);
    }

    #[test]
    fn non_finite_output_is_skipped() {
        let forecaster = Forecaster::new(scalers(), 6, 2).unwrap();
        let run = forecaster.forecast("Tc", &Fixed(vec![f32::NAN, 0.5]), window(1.0, 1.0));
        assert!(run.is_empty());
        assert_eq!(run.skipped, 6);

        let run = forecaster.forecast("Tc", &Fixed(vec![0.5, f32::INFINITY]), window(1.0, 1.0));
        assert_eq!(run.skipped, forecaster.horizon());
    }

    #[test]
    fn extra_outputs_without_matching_bounds_are_skipped() {
        let forecaster = Forecaster::new(scalers(), 2, 2).unwrap();
        let run = forecaster.forecast("9c", &Fixed(vec![0.5, 0.5, 0.5]), window(1.0, 1.0));
        assert!(run.is_empty());
    }

    #[test]
    fn extra_outputs_are_kept_when_configured() {
        let x = FeatureBounds::new(vec![0.0, 0.0], vec![10.0, 10.0]);
        let y = FeatureBounds::new(vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 1.0]);
        let forecaster = Forecaster::new(Arc::new(ScalerPair::new(x, y)), 1, 3).unwrap();
        let run = forecaster.forecast("2c", &Fixed(vec![0.5, 0.5, 0.5]), window(1.0, 1.0));
        assert_eq!(run.steps[0].values, vec![5.0, 5.0, 0.5]);
        assert_eq!(run.steps[0].center(), CenterPoint::new(5.0, 5.0));
    }

    #[test]
    fn bad_scalers_fail_before_predicting() {
        let x = FeatureBounds::new(vec![0.0, 5.0], vec![10.0, 5.0]);
        let y = FeatureBounds::new(vec![0.0, 0.0], vec![10.0, 10.0]);
        let err = Forecaster::new(Arc::new(ScalerPair::new(x, y)), 10, 2).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));

        let empty = FeatureBounds::new(vec![], vec![]);
        let err = Forecaster::new(Arc::new(ScalerPair::new(empty.clone(), empty)), 10, 2).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }
}
