use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardization. `scale` is the population standard
/// deviation; a constant column gets scale 1.0 so it maps to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(features: &Array2<f64>) -> Option<Self> {
        let means = features.mean_axis(Axis(0))?;
        let stds = features.std_axis(Axis(0), 0.0);
        let scale = stds
            .iter()
            .map(|s| if *s > 0.0 && s.is_finite() { *s } else { 1.0 })
            .collect();
        Some(Self {
            mean: means.to_vec(),
            scale,
        })
    }

    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        let mean = Array1::from_vec(self.mean.clone());
        let scale = Array1::from_vec(self.scale.clone());
        (features - &mean) / &scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);

        let z = scaler.transform(&x);
        assert_eq!(z, array![[-1.0, 0.0], [1.0, 0.0]]);
        assert_eq!(scaler.transform(&array![[3.0, 7.0]]), array![[1.0, 2.0]]);
    }

    #[test]
    fn test_population_scale() {
        let x = array![[0.0], [4.0], [8.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let expected = (32.0f64 / 3.0).sqrt();
        assert!((scaler.scale[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_matrix_has_no_fit() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&x).is_none());
    }
}
