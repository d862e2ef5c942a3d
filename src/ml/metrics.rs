use serde::{Deserialize, Serialize};

/// Fraction of positions where the two label vectors agree
pub fn accuracy(predicted: &[f64], actual: &[f64]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let hits = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| (**p >= 0.5) == (**a >= 0.5))
        .count();
    Some(hits as f64 / predicted.len() as f64)
}

/// Sign with zero mapped to zero
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub directional_accuracy: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        let n = predicted.len();
        if n == 0 || n != actual.len() {
            return None;
        }
        let nf = n as f64;

        let directional = predicted
            .iter()
            .zip(actual)
            .filter(|(p, a)| sign(**p) == sign(**a))
            .count() as f64
            / nf;

        let ss_res: f64 = predicted.iter().zip(actual).map(|(p, a)| (a - p).powi(2)).sum();
        let mae = predicted.iter().zip(actual).map(|(p, a)| (a - p).abs()).sum::<f64>() / nf;
        let mean = actual.iter().sum::<f64>() / nf;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        Some(Self {
            directional_accuracy: directional,
            rmse: (ss_res / nf).sqrt(),
            mae,
            r2,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.directional_accuracy.is_finite()
            && self.rmse.is_finite()
            && self.mae.is_finite()
            && self.r2.is_finite()
    }
}
