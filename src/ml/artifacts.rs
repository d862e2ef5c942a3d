use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::selector::{Selection, TickerAccuracy, TickerMetrics};
use crate::config::ArtifactSettings;

/// Fully structured mean-reversion classifier document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub best_ticker: String,
    pub accuracy: f64,
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    /// Shape [1][k]
    pub coefficients: Vec<Vec<f64>>,
    /// Shape [1]
    pub intercept: Vec<f64>,
    pub per_ticker_accuracy: Vec<TickerAccuracy>,
}

impl ClassifierArtifact {
    /// Linear score for one raw feature row in published column order
    pub fn decision_score(&self, raw: &[f64]) -> Result<f64> {
        let k = self.feature_names.len();
        if raw.len() != k {
            bail!("expected {} features ({}), got {}", k, self.feature_names.join(", "), raw.len());
        }
        let (Some(coefficients), Some(intercept)) = (self.coefficients.first(), self.intercept.first())
        else {
            bail!("classifier artifact has no linear parameters");
        };
        if coefficients.len() != k || self.scaler_mean.len() != k || self.scaler_scale.len() != k {
            bail!("classifier artifact parameter shapes disagree with {} features", k);
        }

        let score = raw
            .iter()
            .zip(&self.scaler_mean)
            .zip(&self.scaler_scale)
            .zip(coefficients)
            .map(|(((x, mean), scale), coef)| coef * (x - mean) / scale)
            .sum::<f64>()
            + intercept;
        Ok(score)
    }

    pub fn predict_probability(&self, raw: &[f64]) -> Result<f64> {
        let z = self.decision_score(raw)?;
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

/// Trend regressor metadata; the ensemble itself lives in the blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorArtifact {
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub best_ticker: String,
    pub directional_accuracy: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub feature_names: Vec<String>,
    pub per_ticker_metrics: Vec<TickerMetrics>,
    pub model_artifact: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub classifier: PathBuf,
    pub regressor: PathBuf,
    pub blob: PathBuf,
}

pub struct ArtifactSerializer {
    settings: ArtifactSettings,
}

impl ArtifactSerializer {
    pub fn new(settings: ArtifactSettings) -> Self {
        Self { settings }
    }

    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            classifier: self.settings.classifier_path(),
            regressor: self.settings.regressor_path(),
            blob: self.settings.blob_path(),
        }
    }

    /// Replaces all three artifact files. Every payload is encoded before
    /// the first write, so an encoding failure leaves the old files intact.
    pub fn write(&self, selection: &Selection) -> Result<ArtifactPaths> {
        let paths = self.paths();
        let run_id = Uuid::new_v4();
        let generated_at = Utc::now();

        let classifier = &selection.classifier;
        let classifier_doc = ClassifierArtifact {
            generated_at,
            run_id,
            best_ticker: classifier.ticker.clone(),
            accuracy: classifier.accuracy,
            feature_names: classifier.feature_names.clone(),
            scaler_mean: classifier.scaler.mean.clone(),
            scaler_scale: classifier.scaler.scale.clone(),
            coefficients: vec![classifier.model.coefficients().to_vec()],
            intercept: vec![classifier.model.intercept()],
            per_ticker_accuracy: selection.classifier_table.clone(),
        };

        let regressor = &selection.regressor;
        let regressor_doc = RegressorArtifact {
            generated_at,
            run_id,
            best_ticker: regressor.ticker.clone(),
            directional_accuracy: regressor.metrics.directional_accuracy,
            rmse: regressor.metrics.rmse,
            mae: regressor.metrics.mae,
            r2: regressor.metrics.r2,
            feature_names: regressor.feature_names.clone(),
            per_ticker_metrics: selection.regressor_table.clone(),
            model_artifact: paths.blob.to_string_lossy().into_owned(),
        };

        let classifier_json = serde_json::to_vec_pretty(&classifier_doc).context("encoding classifier artifact")?;
        let regressor_json = serde_json::to_vec_pretty(&regressor_doc).context("encoding regressor artifact")?;
        let blob = regressor
            .model
            .to_bytes(&regressor.feature_names)
            .context("encoding tree ensemble blob")?;

        fs::create_dir_all(&self.settings.dir)
            .with_context(|| format!("creating artifact directory {}", self.settings.dir.display()))?;
        write_replacing(&paths.blob, &blob)?;
        write_replacing(&paths.regressor, &regressor_json)?;
        write_replacing(&paths.classifier, &classifier_json)?;

        info!(
            "run {} wrote {}, {} and {}",
            run_id,
            paths.classifier.display(),
            paths.regressor.display(),
            paths.blob.display()
        );
        Ok(paths)
    }

    pub fn load_classifier(path: &Path) -> Result<ClassifierArtifact> {
        let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn load_regressor(path: &Path) -> Result<RegressorArtifact> {
        let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Writes to a sibling temp file, then renames over the target
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureSettings, TickerUniverse, TrainingSettings};
    use crate::ml::gbm::GradientBoostedTrees;
    use crate::ml::test_support::{scratch_dir, series_with_phase};
    use crate::ml::{FeatureEngine, ModelSelector, ModelTrainer};

    fn selection() -> Selection {
        let trainer = ModelTrainer::new(
            FeatureEngine::new(FeatureSettings::default()),
            TrainingSettings::default(),
        );
        let tickers = vec!["AAA".to_string(), "BBB".to_string()];
        let mut selector = ModelSelector::new(&TickerUniverse::explicit(&tickers));
        for (i, ticker) in tickers.iter().enumerate() {
            let series = series_with_phase(ticker, 320, i as f64);
            selector.record(
                ticker,
                trainer.train_mean_reversion(&series),
                trainer.train_trend(&series),
            );
        }
        selector.finish().unwrap()
    }

    fn serializer(dir: &Path) -> ArtifactSerializer {
        ArtifactSerializer::new(ArtifactSettings {
            dir: dir.to_path_buf(),
            ..ArtifactSettings::default()
        })
    }

    #[test]
    fn test_written_documents_load_back() {
        let dir = scratch_dir("artifacts");
        let selection = selection();
        let paths = serializer(&dir).write(&selection).unwrap();

        let classifier = ArtifactSerializer::load_classifier(&paths.classifier).unwrap();
        let regressor = ArtifactSerializer::load_regressor(&paths.regressor).unwrap();
        assert_eq!(classifier.run_id, regressor.run_id);
        assert_eq!(classifier.best_ticker, selection.classifier.ticker);
        assert_eq!(classifier.coefficients.len(), 1);
        assert_eq!(classifier.coefficients[0].len(), 4);
        assert_eq!(classifier.intercept.len(), 1);
        assert_eq!(classifier.per_ticker_accuracy.len(), 2);
        assert_eq!(regressor.per_ticker_metrics.len(), 2);
        assert_eq!(PathBuf::from(&regressor.model_artifact), paths.blob);

        // no temp files left behind
        let leftovers = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_json_keys_are_stable() {
        let dir = scratch_dir("artifact-keys");
        let selection = selection();
        let paths = serializer(&dir).write(&selection).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&paths.regressor).unwrap()).unwrap();
        for key in ["generated_at", "best_ticker", "directional_accuracy", "rmse", "mae", "r2", "model_artifact"] {
            assert!(raw.get(key).is_some(), "missing {}", key);
        }
        let row = &raw["per_ticker_metrics"][0];
        assert!(row.get("ticker").is_some());
        assert!(row.get("directional_accuracy").is_some());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reloaded_classifier_reproduces_validation_accuracy() {
        let dir = scratch_dir("artifact-accuracy");
        let selection = selection();
        let paths = serializer(&dir).write(&selection).unwrap();
        let artifact = ArtifactSerializer::load_classifier(&paths.classifier).unwrap();

        let phase = if artifact.best_ticker == "AAA" { 0.0 } else { 1.0 };
        let series = series_with_phase(&artifact.best_ticker, 320, phase);
        let frame = FeatureEngine::new(FeatureSettings::default())
            .mean_reversion_frame(&series)
            .unwrap();
        let (_, validation) = frame.dataset.chronological_split(0.8).unwrap();

        let hits = validation
            .features
            .rows()
            .into_iter()
            .zip(validation.targets.iter())
            .filter(|(row, y)| {
                let predicted = if artifact.decision_score(&row.to_vec()).unwrap() > 0.0 { 1.0 } else { 0.0 };
                predicted == **y
            })
            .count();
        let reproduced = hits as f64 / validation.n_samples() as f64;
        assert!((reproduced - artifact.accuracy).abs() < 1e-12);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_blob_predictions_match_in_memory_model() {
        let dir = scratch_dir("artifact-blob");
        let selection = selection();
        let paths = serializer(&dir).write(&selection).unwrap();

        let (names, model) = GradientBoostedTrees::from_bytes(&fs::read(&paths.blob).unwrap()).unwrap();
        assert_eq!(names, selection.regressor.feature_names);
        let row = [0.5, -0.2, 0.01, 55.0, 1.2];
        assert_eq!(
            model.predict_row(&row).unwrap(),
            selection.regressor.model.predict_row(&row).unwrap()
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_feature_count_mismatch_is_an_error() {
        let dir = scratch_dir("artifact-shape");
        let selection = selection();
        let paths = serializer(&dir).write(&selection).unwrap();
        let artifact = ArtifactSerializer::load_classifier(&paths.classifier).unwrap();
        assert!(artifact.predict_probability(&[1.0, 2.0]).is_err());
        let p = artifact.predict_probability(&[0.0, 0.0, 0.0, 50.0]).unwrap();
        assert!((0.0..=1.0).contains(&p));
        fs::remove_dir_all(&dir).ok();
    }
}
