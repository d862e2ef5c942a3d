use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{AppConfig, HistorySettings, TickerUniverse};
use crate::history::{prepare_series, PriceHistorySource};
use crate::ml::artifacts::ArtifactPaths;
use crate::ml::{ArtifactSerializer, FeatureEngine, ModelSelector, ModelTrainer};

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub classifier_ticker: String,
    pub classifier_accuracy: f64,
    pub regressor_ticker: String,
    pub directional_accuracy: f64,
    pub viable_classifiers: usize,
    pub viable_regressors: usize,
    pub paths: ArtifactPaths,
}

/// Batch driver: fetch, gate, train, select, serialize.
/// Tickers are processed one at a time in universe order.
pub struct TrainingPipeline<S: PriceHistorySource> {
    source: S,
    universe: TickerUniverse,
    history: HistorySettings,
    trainer: ModelTrainer,
    serializer: ArtifactSerializer,
}

impl<S: PriceHistorySource> TrainingPipeline<S> {
    pub fn new(source: S, config: &AppConfig) -> Self {
        Self {
            source,
            universe: config.universe.clone(),
            history: config.history.clone(),
            trainer: ModelTrainer::new(
                FeatureEngine::new(config.features.clone()),
                config.training.clone(),
            ),
            serializer: ArtifactSerializer::new(config.artifacts.clone()),
        }
    }

    pub async fn run(&self) -> Result<TrainingSummary> {
        let tickers = self.universe.tickers();
        info!("Training over {} tickers", tickers.len());

        let mut selector = ModelSelector::new(&self.universe);
        for ticker in &tickers {
            let points = match self.source.fetch_history(ticker).await {
                Ok(points) => points,
                Err(e) => {
                    selector.skip(ticker, &format!("fetch failed: {:#}", e));
                    continue;
                }
            };

            let series = match prepare_series(ticker, points, &self.history, Utc::now()) {
                Ok(series) => series,
                Err(e) => {
                    selector.skip(ticker, &e.to_string());
                    continue;
                }
            };

            info!("{}: {} closes inside the lookback window", ticker, series.len());
            selector.record(
                ticker,
                self.trainer.train_mean_reversion(&series),
                self.trainer.train_trend(&series),
            );
        }

        let (viable_classifiers, viable_regressors) = selector.viable_counts();
        let selection = match selector.finish() {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Run aborted, existing artifacts left untouched");
                return Err(e.into());
            }
        };
        let paths = self.serializer.write(&selection)?;

        info!(
            "Best mean-reversion ticker: {} (accuracy {:.4})",
            selection.classifier.ticker, selection.classifier.accuracy
        );
        info!(
            "Best trend ticker: {} (directional accuracy {:.4}, rmse {:.6})",
            selection.regressor.ticker,
            selection.regressor.metrics.directional_accuracy,
            selection.regressor.metrics.rmse
        );

        Ok(TrainingSummary {
            classifier_ticker: selection.classifier.ticker.clone(),
            classifier_accuracy: selection.classifier.accuracy,
            regressor_ticker: selection.regressor.ticker.clone(),
            directional_accuracy: selection.regressor.metrics.directional_accuracy,
            viable_classifiers,
            viable_regressors,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MockPriceHistorySource;
    use crate::ml::test_support::{recent_points, scratch_dir};
    use crate::ml::selector::SelectionError;
    use anyhow::anyhow;
    use std::path::Path;

    fn config(tickers: &[&str], artifacts_dir: &Path) -> AppConfig {
        let list: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
        let mut config = AppConfig::default();
        config.universe = TickerUniverse::explicit(&list);
        config.artifacts.dir = artifacts_dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_run_skips_failed_tickers_and_writes_artifacts() {
        let dir = scratch_dir("pipeline").join("models");
        let mut source = MockPriceHistorySource::new();
        source.expect_fetch_history().returning(|ticker: &str| match ticker {
            "AAA" => Ok(recent_points(320, 0.0)),
            "BBB" => Err(anyhow!("connection reset")),
            "CCC" => Ok(recent_points(30, 0.5)),
            _ => Ok(recent_points(320, 1.3)),
        });

        let pipeline = TrainingPipeline::new(source, &config(&["AAA", "BBB", "CCC", "DDD"], &dir));
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.viable_classifiers, 2);
        assert_eq!(summary.viable_regressors, 2);
        assert!(["AAA", "DDD"].contains(&summary.classifier_ticker.as_str()));
        assert!(["AAA", "DDD"].contains(&summary.regressor_ticker.as_str()));
        assert!(summary.paths.classifier.exists());
        assert!(summary.paths.regressor.exists());
        assert!(summary.paths.blob.exists());
        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_zero_viable_regressors_writes_nothing() {
        let dir = scratch_dir("pipeline-empty").join("models");
        let mut source = MockPriceHistorySource::new();
        // enough rows for the classifier frame, too few for the trend frame
        source
            .expect_fetch_history()
            .times(2)
            .returning(|_| Ok(recent_points(130, 0.2)));

        let pipeline = TrainingPipeline::new(source, &config(&["AAA", "BBB"], &dir));
        let err = pipeline.run().await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<SelectionError>(),
            Some(&SelectionError::NoViableModels(crate::ml::ModelVariant::Trend))
        );
        assert!(!dir.exists());
        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }
}
