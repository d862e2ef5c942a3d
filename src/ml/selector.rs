use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::metrics::RegressionMetrics;
use super::trainer::{TrainedClassifier, TrainedRegressor, TrainingError};
use super::ModelVariant;
use crate::config::TickerUniverse;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no viable {0} model across the ticker universe")]
    NoViableModels(ModelVariant),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerAccuracy {
    pub ticker: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMetrics {
    pub ticker: String,
    #[serde(flatten)]
    pub metrics: RegressionMetrics,
}

/// Winners of one run plus the per-ticker tables for audit
#[derive(Debug, Clone)]
pub struct Selection {
    pub classifier: TrainedClassifier,
    pub regressor: TrainedRegressor,
    pub classifier_table: Vec<TickerAccuracy>,
    pub regressor_table: Vec<TickerMetrics>,
}

/// Accumulates both variants' results over the universe and picks the
/// best ticker per variant. Ties go to the ticker first in universe order.
#[derive(Debug)]
pub struct ModelSelector {
    order: Vec<String>,
    classifiers: Vec<TrainedClassifier>,
    regressors: Vec<TrainedRegressor>,
    skipped: usize,
}

impl ModelSelector {
    pub fn new(universe: &TickerUniverse) -> Self {
        Self {
            order: universe.tickers(),
            classifiers: Vec::new(),
            regressors: Vec::new(),
            skipped: 0,
        }
    }

    pub fn record(
        &mut self,
        ticker: &str,
        classifier: Result<TrainedClassifier, TrainingError>,
        regressor: Result<TrainedRegressor, TrainingError>,
    ) {
        match classifier {
            Ok(model) => self.classifiers.push(model),
            Err(e) => {
                warn!("{}: no {} model: {}", ticker, ModelVariant::MeanReversion, e);
                self.skipped += 1;
            }
        }
        match regressor {
            Ok(model) => self.regressors.push(model),
            Err(e) => {
                warn!("{}: no {} model: {}", ticker, ModelVariant::Trend, e);
                self.skipped += 1;
            }
        }
    }

    /// Logs a ticker that never reached training (fetch failure, too few rows)
    pub fn skip(&mut self, ticker: &str, reason: &str) {
        warn!("{}: skipped: {}", ticker, reason);
        self.skipped += 2;
    }

    pub fn viable_counts(&self) -> (usize, usize) {
        (self.classifiers.len(), self.regressors.len())
    }

    fn rank(&self, ticker: &str) -> usize {
        self.order
            .iter()
            .position(|t| t == ticker)
            .unwrap_or(usize::MAX)
    }

    pub fn finish(self) -> Result<Selection, SelectionError> {
        let classifier_idx = self
            .best_index(self.classifiers.iter().map(|c| (c.ticker.as_str(), c.accuracy)))
            .ok_or(SelectionError::NoViableModels(ModelVariant::MeanReversion))?;
        let regressor_idx = self
            .best_index(
                self.regressors
                    .iter()
                    .map(|r| (r.ticker.as_str(), r.metrics.directional_accuracy)),
            )
            .ok_or(SelectionError::NoViableModels(ModelVariant::Trend))?;

        let classifier_table = self
            .classifiers
            .iter()
            .map(|c| TickerAccuracy {
                ticker: c.ticker.clone(),
                accuracy: c.accuracy,
            })
            .collect();
        let regressor_table = self
            .regressors
            .iter()
            .map(|r| TickerMetrics {
                ticker: r.ticker.clone(),
                metrics: r.metrics,
            })
            .collect();

        let ModelSelector {
            mut classifiers,
            mut regressors,
            skipped,
            ..
        } = self;
        let classifier = classifiers.swap_remove(classifier_idx);
        let regressor = regressors.swap_remove(regressor_idx);

        info!(
            "selected {} classifier from {} (accuracy {:.4}, {} train / {} validation rows)",
            ModelVariant::MeanReversion,
            classifier.ticker,
            classifier.accuracy,
            classifier.train_rows,
            classifier.validation_rows
        );
        info!(
            "selected {} regressor from {} (directional accuracy {:.4}, {} train / {} validation rows)",
            ModelVariant::Trend,
            regressor.ticker,
            regressor.metrics.directional_accuracy,
            regressor.train_rows,
            regressor.validation_rows
        );
        if skipped > 0 {
            info!("{} per-ticker fits skipped", skipped);
        }

        Ok(Selection {
            classifier,
            regressor,
            classifier_table,
            regressor_table,
        })
    }

    /// Highest finite score, earliest universe position on ties
    fn best_index<'a>(&self, scores: impl Iterator<Item = (&'a str, f64)>) -> Option<usize> {
        let mut best: Option<(usize, f64, usize)> = None;
        for (idx, (ticker, score)) in scores.enumerate() {
            if !score.is_finite() {
                continue;
            }
            let rank = self.rank(ticker);
            let better = match best {
                None => true,
                Some((_, best_score, best_rank)) => {
                    score > best_score || (score == best_score && rank < best_rank)
                }
            };
            if better {
                best = Some((idx, score, rank));
            }
        }
        best.map(|(idx, _, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureSettings, TrainingSettings};
    use crate::ml::test_support::series_with_phase;
    use crate::ml::{FeatureEngine, ModelTrainer};

    fn trainer() -> ModelTrainer {
        ModelTrainer::new(
            FeatureEngine::new(FeatureSettings::default()),
            TrainingSettings::default(),
        )
    }

    fn universe(tickers: &[&str]) -> TickerUniverse {
        let list: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
        TickerUniverse::explicit(&list)
    }

    fn with_scores(
        ticker: &str,
        accuracy: f64,
        directional: f64,
    ) -> (TrainedClassifier, TrainedRegressor) {
        let trainer = trainer();
        let series = series_with_phase(ticker, 260, 0.0);
        let mut c = trainer.train_mean_reversion(&series).unwrap();
        let mut r = trainer.train_trend(&series).unwrap();
        c.accuracy = accuracy;
        r.metrics.directional_accuracy = directional;
        (c, r)
    }

    #[test]
    fn test_tie_goes_to_first_in_universe_order() {
        let mut selector = ModelSelector::new(&universe(&["AAA", "BBB", "CCC"]));
        // recorded out of universe order on purpose
        for (ticker, acc, dir) in [("CCC", 0.6, 0.5), ("BBB", 0.6, 0.7), ("AAA", 0.55, 0.7)] {
            let (c, r) = with_scores(ticker, acc, dir);
            selector.record(ticker, Ok(c), Ok(r));
        }

        let selection = selector.finish().unwrap();
        assert_eq!(selection.classifier.ticker, "BBB");
        assert_eq!(selection.regressor.ticker, "AAA");
        assert_eq!(selection.classifier_table.len(), 3);
        assert_eq!(selection.regressor_table.len(), 3);
    }

    #[test]
    fn test_non_finite_score_never_wins() {
        let mut selector = ModelSelector::new(&universe(&["AAA", "BBB"]));
        let (c, r) = with_scores("AAA", f64::NAN, f64::NAN);
        selector.record("AAA", Ok(c), Ok(r));
        let (c, r) = with_scores("BBB", 0.1, 0.1);
        selector.record("BBB", Ok(c), Ok(r));

        let selection = selector.finish().unwrap();
        assert_eq!(selection.classifier.ticker, "BBB");
        assert_eq!(selection.regressor.ticker, "BBB");
    }

    #[test]
    fn test_zero_viable_regressors_is_fatal() {
        let mut selector = ModelSelector::new(&universe(&["AAA", "BBB"]));
        let (c, _) = with_scores("AAA", 0.6, 0.6);
        selector.record("AAA", Ok(c), Err(TrainingError::NonFinite));
        selector.skip("BBB", "fetch failed");

        assert_eq!(selector.viable_counts(), (1, 0));
        assert_eq!(
            selector.finish().unwrap_err(),
            SelectionError::NoViableModels(ModelVariant::Trend)
        );
    }

    #[test]
    fn test_empty_selector_fails_on_classifier_first() {
        let selector = ModelSelector::new(&universe(&["AAA"]));
        assert_eq!(
            selector.finish().unwrap_err(),
            SelectionError::NoViableModels(ModelVariant::MeanReversion)
        );
    }
}
