use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::GbmParams;

/// Bumped whenever the encoded layout of the ensemble changes
pub const BLOB_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum GbmError {
    #[error("blob encoding failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("unsupported blob format version {0}")]
    UnsupportedVersion(u32),
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Least-squares regression tree stored as a flat node list, root at 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(features: &Array2<f64>, residuals: &[f64], params: &GbmParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..features.nrows()).collect();
        tree.build(features, residuals, indices, 0, params);
        tree
    }

    fn build(
        &mut self,
        features: &Array2<f64>,
        residuals: &[f64],
        indices: Vec<usize>,
        depth: usize,
        params: &GbmParams,
    ) -> usize {
        let id = self.nodes.len();
        let value = indices.iter().map(|&i| residuals[i]).sum::<f64>() / indices.len().max(1) as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= params.max_depth {
            return id;
        }
        let Some((feature, threshold)) = best_split(features, residuals, &indices, params.min_samples_leaf)
        else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| features[[i, feature]] <= threshold);

        let left = self.build(features, residuals, left_rows, depth + 1, params);
        let right = self.build(features, residuals, right_rows, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Exact greedy search over every feature and every distinct cut point.
/// Maximizes the squared-error reduction subject to the leaf floor.
fn best_split(
    features: &Array2<f64>,
    residuals: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<(usize, f64)> {
    let n = indices.len();
    let min_leaf = min_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let total: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<(usize, f64)> = None;
    let mut best_gain = 1e-12;

    for feature in 0..features.ncols() {
        let mut order: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (features[[i, feature]], residuals[i]))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += order[k].1;
            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf {
                continue;
            }
            if right_n < min_leaf {
                break;
            }
            if order[k].0 == order[k + 1].0 {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
                - parent_score;
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, (order[k].0 + order[k + 1].0) / 2.0));
            }
        }
    }

    best
}

/// Gradient-boosted least-squares regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    baseline: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

#[derive(Serialize, Deserialize)]
struct BlobEnvelope {
    format_version: u32,
    feature_names: Vec<String>,
    model: GradientBoostedTrees,
}

impl GradientBoostedTrees {
    /// `None` when there is nothing to fit or the targets are not finite
    pub fn fit(features: &Array2<f64>, targets: &Array1<f64>, params: &GbmParams) -> Option<Self> {
        let n = features.nrows();
        if n == 0 || targets.len() != n || targets.iter().any(|t| !t.is_finite()) {
            return None;
        }

        let baseline = targets.mean()?;
        let mut predictions = vec![baseline; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(predictions.iter())
                .map(|(y, p)| y - p)
                .collect();

            let tree = RegressionTree::fit(features, &residuals, params);
            for (i, row) in features.rows().into_iter().enumerate() {
                let row = row.to_vec();
                predictions[i] += params.learning_rate * tree.predict(&row);
            }
            trees.push(tree);
        }

        debug!(
            "boosted {} trees on {} rows, baseline {:.6}",
            trees.len(),
            n,
            baseline
        );

        Some(Self {
            baseline,
            learning_rate: params.learning_rate,
            n_features: features.ncols(),
            trees,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, GbmError> {
        if row.len() != self.n_features {
            return Err(GbmError::FeatureCount {
                expected: self.n_features,
                got: row.len(),
            });
        }
        Ok(self.baseline
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(row))
                .sum::<f64>())
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, GbmError> {
        features
            .rows()
            .into_iter()
            .map(|row| self.predict_row(&row.to_vec()))
            .collect()
    }

    /// Versioned binary envelope holding the feature order and the ensemble
    pub fn to_bytes(&self, feature_names: &[String]) -> Result<Vec<u8>, GbmError> {
        let envelope = BlobEnvelope {
            format_version: BLOB_FORMAT_VERSION,
            feature_names: feature_names.to_vec(),
            model: self.clone(),
        };
        Ok(bincode::serialize(&envelope)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Vec<String>, Self), GbmError> {
        let envelope: BlobEnvelope = bincode::deserialize(bytes)?;
        if envelope.format_version != BLOB_FORMAT_VERSION {
            return Err(GbmError::UnsupportedVersion(envelope.format_version));
        }
        Ok((envelope.feature_names, envelope.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { -1.0 } else { 2.0 });
        (x, y)
    }

    #[test]
    fn test_fits_a_step_function() {
        let (x, y) = step_data(100);
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        assert_eq!(model.n_trees(), 200);

        let low = model.predict_row(&[10.0, 3.0]).unwrap();
        let high = model.predict_row(&[90.0, 3.0]).unwrap();
        assert!((low + 1.0).abs() < 0.05);
        assert!((high - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_constant_target_predicts_baseline() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(50, 0.3);
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        assert!((model.predict_row(&[25.0]).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_leaf_floor_blocks_splits_on_small_data() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| i as f64);
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        // 30 rows cannot be cut into two leaves of 20
        let a = model.predict_row(&[0.0]).unwrap();
        let b = model.predict_row(&[29.0]).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_feature_count() {
        let (x, y) = step_data(60);
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        assert!(matches!(
            model.predict_row(&[1.0]),
            Err(GbmError::FeatureCount { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_blob_round_trip_keeps_predictions() {
        let (x, y) = step_data(80);
        let model = GradientBoostedTrees::fit(&x, &y, &GbmParams::default()).unwrap();
        let names = vec!["a".to_string(), "b".to_string()];

        let bytes = model.to_bytes(&names).unwrap();
        let (decoded_names, decoded) = GradientBoostedTrees::from_bytes(&bytes).unwrap();
        assert_eq!(decoded_names, names);
        assert_eq!(decoded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_garbage_blob_rejected() {
        assert!(GradientBoostedTrees::from_bytes(&[1, 2, 3]).is_err());
    }
}
