use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::gbm::{GbmError, GradientBoostedTrees};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("model blob not found at {0}")]
    MissingModel(PathBuf),
    #[error("cannot read model blob {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model blob {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: GbmError,
    },
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },
    #[error("feature {index} is not a finite number")]
    NonFiniteFeature { index: usize },
}

/// Capability to turn one raw feature vector into one score
pub trait ScorePredictor {
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> Result<f64, BridgeError>;
}

/// Tree ensemble materialized from the opaque blob
#[derive(Debug, Clone)]
pub struct TreeEnsembleBridge {
    feature_names: Vec<String>,
    model: GradientBoostedTrees,
}

impl TreeEnsembleBridge {
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        if !path.exists() {
            return Err(BridgeError::MissingModel(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| BridgeError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let (feature_names, model) =
            GradientBoostedTrees::from_bytes(&bytes).map_err(|source| BridgeError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            "loaded {} trees over {} features from {}",
            model.n_trees(),
            feature_names.len(),
            path.display()
        );
        Ok(Self {
            feature_names,
            model,
        })
    }
}

impl ScorePredictor for TreeEnsembleBridge {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<f64, BridgeError> {
        if let Some(index) = features.iter().position(|v| !v.is_finite()) {
            return Err(BridgeError::NonFiniteFeature { index });
        }
        self.model.predict_row(features).map_err(|e| match e {
            GbmError::FeatureCount { expected, got } => BridgeError::FeatureCount { expected, got },
            other => BridgeError::Corrupt {
                path: PathBuf::new(),
                source: other,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub model_path: PathBuf,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

/// Loads the blob named in the request and scores its single row
pub fn run_prediction(request: &PredictRequest) -> Result<PredictResponse, BridgeError> {
    let bridge = TreeEnsembleBridge::load(&request.model_path)?;
    let prediction = bridge.predict(&request.features)?;
    Ok(PredictResponse { prediction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GbmParams;
    use crate::ml::test_support::scratch_dir;
    use ndarray::{Array1, Array2};

    fn write_blob(dir: &Path) -> (PathBuf, GradientBoostedTrees) {
        let x = Array2::from_shape_fn((80, 3), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(80, |i| if i % 3 == 0 { 0.02 } else { -0.01 });
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let path = dir.join("trend_model.bin");
        std::fs::write(&path, model.to_bytes(&names).unwrap()).unwrap();
        (path, model)
    }

    #[test]
    fn test_prediction_matches_model() {
        let dir = scratch_dir("bridge");
        let (path, model) = write_blob(&dir);

        let request: PredictRequest = serde_json::from_str(&format!(
            r#"{{"modelPath": {:?}, "features": [10.0, 20.0, 30.0]}}"#,
            path.to_string_lossy()
        ))
        .unwrap();
        let response = run_prediction(&request).unwrap();
        assert_eq!(response.prediction, model.predict_row(&[10.0, 20.0, 30.0]).unwrap());

        let bridge = TreeEnsembleBridge::load(&path).unwrap();
        assert_eq!(bridge.feature_names().len(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let request = PredictRequest {
            model_path: PathBuf::from("/nonexistent/trend_model.bin"),
            features: vec![1.0, 2.0, 3.0],
        };
        assert!(matches!(run_prediction(&request), Err(BridgeError::MissingModel(_))));
    }

    #[test]
    fn test_wrong_feature_count_is_fatal() {
        let dir = scratch_dir("bridge-shape");
        let (path, _) = write_blob(&dir);
        let request = PredictRequest {
            model_path: path,
            features: vec![1.0, 2.0],
        };
        assert!(matches!(
            run_prediction(&request),
            Err(BridgeError::FeatureCount { expected: 3, got: 2 })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_blob_is_fatal() {
        let dir = scratch_dir("bridge-corrupt");
        let path = dir.join("trend_model.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(matches!(TreeEnsembleBridge::load(&path), Err(BridgeError::Corrupt { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_request_requires_both_fields() {
        assert!(serde_json::from_str::<PredictRequest>(r#"{"features": [1.0]}"#).is_err());
        assert!(serde_json::from_str::<PredictRequest>(r#"{"modelPath": "x", "features": "1"}"#).is_err());
    }
}
