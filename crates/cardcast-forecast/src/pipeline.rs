//! Ranking groups end to end: history → window → forecast → rank.

use crate::forecaster::{Forecaster, PredictionRun};
use crate::ranker::{Ranker, RankingGroup, RankingOutcome};
use crate::{ForecastError, Predictor, Result};
use cardcast_history::HistorySource;
use cardcast_model::ModelConfig;
use cardcast_preprocess::{ScalerPair, SequenceBuilder, SequenceWindow, CENTER_FEATURES};
use log::warn;
use std::sync::Arc;

/// Result of evaluating one [`RankingGroup`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub group: RankingGroup,
    /// Runs in group order.
    pub runs: [PredictionRun; 2],
    pub outcome: RankingOutcome,
}

#[derive(Debug, Clone)]
pub struct RankingPipeline {
    builder: SequenceBuilder,
    forecaster: Forecaster,
    ranker: Ranker,
}

impl RankingPipeline {
    pub fn new(config: &ModelConfig, scalers: Arc<ScalerPair>) -> Result<Self> {
        let builder = SequenceBuilder::new(config.sequence_length)
            .map_err(|e| ForecastError::Configuration(e.to_string()))?;
        if config.input_features != CENTER_FEATURES {
            return Err(ForecastError::Configuration(format!(
                "windows carry {CENTER_FEATURES} features (cx, cy), config asks for {}",
                config.input_features
            )));
        }
        if config.horizon < 2 {
            return Err(ForecastError::Configuration(format!(
                "horizon {} leaves no scored steps",
                config.horizon
            )));
        }
        let forecaster = Forecaster::new(scalers, config.horizon, config.output_features)?;
        Ok(Self { builder, forecaster, ranker: Ranker::new(config.horizon) })
    }

    /// Initial window for `label`. A label with no history is an empty history.
    pub fn window(&self, label: &str, source: &dyn HistorySource) -> Result<SequenceWindow> {
        let history = source.history(label).unwrap_or(&[]);
        self.builder
            .build(history)
            .map_err(|e| ForecastError::from_preprocess(e, label))
    }

    pub fn forecast_label(
        &self,
        label: &str,
        source: &dyn HistorySource,
        predictor: &dyn Predictor,
    ) -> Result<PredictionRun> {
        let window = self.window(label, source)?;
        Ok(self.forecaster.forecast(label, predictor, window))
    }

    pub fn evaluate_group(
        &self,
        group: &RankingGroup,
        source: &dyn HistorySource,
        predictor: &dyn Predictor,
    ) -> Result<GroupReport> {
        // both windows before any prediction, so an empty history never
        // costs a half-finished run
        let first = self.window(&group.first, source)?;
        let second = self.window(&group.second, source)?;

        let runs = [
            self.forecaster.forecast(&group.first, predictor, first),
            self.forecaster.forecast(&group.second, predictor, second),
        ];
        let outcome = self.ranker.rank(group, &runs[0], &runs[1]);
        Ok(GroupReport { group: group.clone(), runs, outcome })
    }

    /// Evaluate groups in order. Each group keeps its own result: a group
    /// with an empty history reports that error and the rest still run.
    pub fn evaluate_groups(
        &self,
        groups: &[RankingGroup],
        source: &dyn HistorySource,
        predictor: &dyn Predictor,
    ) -> Vec<Result<GroupReport>> {
        groups
            .iter()
            .map(|group| {
                let report = self.evaluate_group(group, source, predictor);
                if let Err(e) = &report {
                    warn!("group {}/{}: {}", group.first, group.second, e);
                }
                report
            })
            .collect()
    }
}

/// Evaluate every group on its own blocking task. Results come back in
/// input order, one per group, after every task has finished. Predictor
/// calls are not timed out or cancelled.
pub async fn evaluate_groups_concurrently<S>(
    pipeline: Arc<RankingPipeline>,
    groups: Vec<RankingGroup>,
    source: Arc<S>,
    predictor: Arc<dyn Predictor>,
) -> Vec<Result<GroupReport>>
where
    S: HistorySource + Send + Sync + 'static,
{
    let handles: Vec<_> = groups
        .into_iter()
        .map(|group| {
            let pipeline = Arc::clone(&pipeline);
            let source = Arc::clone(&source);
            let predictor = Arc::clone(&predictor);
            tokio::task::spawn_blocking(move || {
                let report = pipeline.evaluate_group(&group, source.as_ref(), predictor.as_ref());
                if let Err(e) = &report {
                    warn!("group {}/{}: {}", group.first, group.second, e);
                }
                report
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await.map_err(ForecastError::from).and_then(|report| report));
    }
    reports
}
