use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LogisticParams;

/// Binary logistic regression over standardized features.
/// Fitted by full-batch gradient descent with an L2 penalty and
/// optional balanced class weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    /// `None` when the labels hold a single class or the fit diverges
    pub fn fit(features: &Array2<f64>, labels: &Array1<f64>, params: &LogisticParams) -> Option<Self> {
        let n = features.nrows();
        let num_features = features.ncols();
        if n == 0 || labels.len() != n {
            return None;
        }

        let positives = labels.iter().filter(|y| **y >= 0.5).count();
        let negatives = n - positives;
        if positives == 0 || negatives == 0 {
            return None;
        }

        let sample_weights: Array1<f64> = if params.balanced_class_weights {
            let w_pos = n as f64 / (2.0 * positives as f64);
            let w_neg = n as f64 / (2.0 * negatives as f64);
            labels.mapv(|y| if y >= 0.5 { w_pos } else { w_neg })
        } else {
            Array1::ones(n)
        };

        let lambda = 1.0 / (params.inverse_regularization * n as f64);
        let mut coefficients = Array1::<f64>::zeros(num_features);
        let mut intercept = 0.0;
        let mut iterations = 0;

        for iter in 0..params.max_iter {
            iterations = iter + 1;
            let z = features.dot(&coefficients) + intercept;
            let error = (z.mapv(sigmoid) - labels) * &sample_weights;

            let grad_coef = features.t().dot(&error) / n as f64 + &coefficients * lambda;
            let grad_intercept = error.sum() / n as f64;

            coefficients = coefficients - &grad_coef * params.learning_rate;
            intercept -= params.learning_rate * grad_intercept;

            let max_grad = grad_coef
                .iter()
                .fold(grad_intercept.abs(), |acc, g| acc.max(g.abs()));
            if max_grad < params.tolerance {
                break;
            }
        }

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return None;
        }

        debug!(
            "logistic fit: {} rows, {} positive, stopped after {} iterations",
            n, positives, iterations
        );

        Some(Self {
            coefficients: coefficients.to_vec(),
            intercept,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn decision_function(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    /// Class 1 when the linear score is strictly positive
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        features
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                if self.decision_function(&row) > 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_data() {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let model = LogisticRegression::fit(&x, &y, &LogisticParams::default()).unwrap();

        assert!(model.coefficients()[0] > 0.0);
        assert_eq!(model.predict(&x), y);
        assert!(sigmoid(model.decision_function(&[2.0])) > 0.8);
        assert!(sigmoid(model.decision_function(&[-2.0])) < 0.2);
    }

    #[test]
    fn test_balanced_weights_offset_class_imbalance() {
        // 6 negatives and 2 positives with no usable signal
        let x = Array2::<f64>::zeros((8, 1));
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];

        let balanced = LogisticRegression::fit(&x, &y, &LogisticParams::default()).unwrap();
        assert!(balanced.intercept().abs() < 1e-3);

        let params = LogisticParams {
            balanced_class_weights: false,
            ..LogisticParams::default()
        };
        let plain = LogisticRegression::fit(&x, &y, &params).unwrap();
        assert!(plain.intercept() < -0.5);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 1.0, 1.0];
        assert!(LogisticRegression::fit(&x, &y, &LogisticParams::default()).is_none());
    }
}
