pub mod features;
pub mod dataset;
pub mod scaler;
pub mod logistic;
pub mod gbm;
pub mod metrics;
pub mod trainer;
pub mod selector;
pub mod artifacts;
pub mod bridge;

#[cfg(test)]
pub(crate) mod test_support;

pub use features::FeatureEngine;
pub use trainer::ModelTrainer;
pub use selector::ModelSelector;
pub use artifacts::ArtifactSerializer;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two learned model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    MeanReversion,
    Trend,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::MeanReversion => "mean_reversion",
            ModelVariant::Trend => "trend",
        }
    }

    /// Published column order, shared by training and inference
    pub fn feature_names(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ModelVariant::MeanReversion => &features::MEAN_REVERSION_FEATURES,
            ModelVariant::Trend => &features::TREND_FEATURES,
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
