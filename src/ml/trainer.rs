use thiserror::Error;
use tracing::debug;

use super::features::{FeatureEngine, FeatureError};
use super::gbm::GradientBoostedTrees;
use super::logistic::LogisticRegression;
use super::metrics::{accuracy, RegressionMetrics};
use super::scaler::StandardScaler;
use crate::config::TrainingSettings;
use crate::types::PriceSeries;

/// Reasons a single ticker produces no model. All of them are soft:
/// the ticker is skipped and the run continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainingError {
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error("chronological split of {rows} rows leaves an empty side")]
    DegenerateSplit { rows: usize },
    #[error("training side holds a single class")]
    SingleClass,
    #[error("fit did not converge to finite parameters")]
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    pub ticker: String,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub model: LogisticRegression,
    pub accuracy: f64,
    pub train_rows: usize,
    pub validation_rows: usize,
}

#[derive(Debug, Clone)]
pub struct TrainedRegressor {
    pub ticker: String,
    pub feature_names: Vec<String>,
    pub model: GradientBoostedTrees,
    pub metrics: RegressionMetrics,
    pub train_rows: usize,
    pub validation_rows: usize,
}

/// Fits one model per ticker per variant on a chronological split
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    engine: FeatureEngine,
    settings: TrainingSettings,
}

impl ModelTrainer {
    pub fn new(engine: FeatureEngine, settings: TrainingSettings) -> Self {
        Self { engine, settings }
    }

    pub fn train_mean_reversion(&self, series: &PriceSeries) -> Result<TrainedClassifier, TrainingError> {
        let frame = self.engine.mean_reversion_frame(series)?;
        let rows = frame.dataset.n_samples();
        let (train, validation) = frame
            .dataset
            .chronological_split(self.settings.train_fraction)
            .ok_or(TrainingError::DegenerateSplit { rows })?;

        let scaler = StandardScaler::fit(&train.features).ok_or(TrainingError::DegenerateSplit { rows })?;
        let train_x = scaler.transform(&train.features);
        let model = LogisticRegression::fit(&train_x, &train.targets, &self.settings.logistic)
            .ok_or_else(|| {
                if single_class(&train.targets.to_vec()) {
                    TrainingError::SingleClass
                } else {
                    TrainingError::NonFinite
                }
            })?;

        let predicted = model.predict(&scaler.transform(&validation.features));
        let acc = accuracy(&predicted.to_vec(), &validation.targets.to_vec())
            .filter(|a| a.is_finite())
            .ok_or(TrainingError::NonFinite)?;

        debug!(
            "{}: classifier accuracy {:.4} ({} train / {} validation from {:?})",
            series.ticker(),
            acc,
            train.n_samples(),
            validation.n_samples(),
            frame.validation_start(train.n_samples())
        );

        Ok(TrainedClassifier {
            ticker: series.ticker().to_string(),
            feature_names: frame.dataset.feature_names.clone(),
            scaler,
            model,
            accuracy: acc,
            train_rows: train.n_samples(),
            validation_rows: validation.n_samples(),
        })
    }

    pub fn train_trend(&self, series: &PriceSeries) -> Result<TrainedRegressor, TrainingError> {
        let frame = self.engine.trend_frame(series)?;
        let rows = frame.dataset.n_samples();
        let (train, validation) = frame
            .dataset
            .chronological_split(self.settings.train_fraction)
            .ok_or(TrainingError::DegenerateSplit { rows })?;

        let model = GradientBoostedTrees::fit(&train.features, &train.targets, &self.settings.gbm)
            .ok_or(TrainingError::NonFinite)?;
        let predicted = model
            .predict(&validation.features)
            .map_err(|_| TrainingError::NonFinite)?;
        let metrics = RegressionMetrics::compute(&predicted.to_vec(), &validation.targets.to_vec())
            .filter(|m| m.is_finite())
            .ok_or(TrainingError::NonFinite)?;

        debug!(
            "{}: regressor directional accuracy {:.4}, rmse {:.6} ({} train / {} validation from {:?})",
            series.ticker(),
            metrics.directional_accuracy,
            metrics.rmse,
            train.n_samples(),
            validation.n_samples(),
            frame.validation_start(train.n_samples())
        );

        Ok(TrainedRegressor {
            ticker: series.ticker().to_string(),
            feature_names: frame.dataset.feature_names.clone(),
            model,
            metrics,
            train_rows: train.n_samples(),
            validation_rows: validation.n_samples(),
        })
    }
}

fn single_class(labels: &[f64]) -> bool {
    labels.iter().all(|y| *y >= 0.5) || labels.iter().all(|y| *y < 0.5)
}
