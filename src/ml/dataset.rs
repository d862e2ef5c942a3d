use ndarray::{s, Array1, Array2};

/// Feature matrix with aligned targets, rows in time order
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, features: Array2<f64>, targets: Array1<f64>) -> Self {
        Self {
            feature_names,
            features,
            targets,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Leading `train_fraction` of rows for training, the rest for validation.
    /// Never shuffles. `None` when either side would be empty.
    pub fn chronological_split(&self, train_fraction: f64) -> Option<(Dataset, Dataset)> {
        let n = self.n_samples();
        let split = (n as f64 * train_fraction).floor() as usize;
        if split == 0 || split >= n {
            return None;
        }

        let train = Dataset::new(
            self.feature_names.clone(),
            self.features.slice(s![..split, ..]).to_owned(),
            self.targets.slice(s![..split]).to_owned(),
        );
        let validation = Dataset::new(
            self.feature_names.clone(),
            self.features.slice(s![split.., ..]).to_owned(),
            self.targets.slice(s![split..]).to_owned(),
        );
        Some((train, validation))
    }
}
