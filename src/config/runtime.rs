use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::universe::TickerUniverse;

const ENV_PREFIX: &str = "MLBOTS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub universe: TickerUniverse,
    pub history: HistorySettings,
    pub features: FeatureSettings,
    pub training: TrainingSettings,
    pub artifacts: ArtifactSettings,
    pub decisions: DecisionSettings,
}

impl AppConfig {
    /// Layer an optional TOML file under `MLBOTS__SECTION__KEY` environment
    /// overrides. `.env.local` and `.env` are loaded first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: AppConfig = builder.build()?.try_deserialize()?;
        loaded.history.fill_credentials_from_env();

        if let Err(errors) = loaded.validate() {
            return Err(anyhow!("Invalid configuration: {}", errors.join(", ")));
        }
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.universe.validate();

        if self.history.min_rows == 0 {
            errors.push("history.min_rows must be > 0".to_string());
        }
        if self.history.lookback_days <= 0 {
            errors.push("history.lookback_days must be > 0".to_string());
        }

        let f = &self.features;
        if f.zscore_window < 2 {
            errors.push("features.zscore_window must be >= 2".to_string());
        }
        if f.rsi_period == 0 || f.roc_period == 0 || f.momentum_period == 0 || f.atr_period == 0 {
            errors.push("features: periods must be > 0".to_string());
        }
        if f.horizon == 0 {
            errors.push("features.horizon must be > 0".to_string());
        }
        if !(f.ema_fast_span < f.ema_medium_span && f.ema_medium_span < f.ema_slow_span) {
            errors.push("features: ema spans must satisfy fast < medium < slow".to_string());
        }

        let t = &self.training;
        if !(t.train_fraction > 0.0 && t.train_fraction < 1.0) {
            errors.push("training.train_fraction must be between 0 and 1".to_string());
        }
        if t.logistic.max_iter == 0 || t.logistic.learning_rate <= 0.0 {
            errors.push("training.logistic: max_iter and learning_rate must be > 0".to_string());
        }
        if t.gbm.n_estimators == 0 || t.gbm.max_depth == 0 || t.gbm.learning_rate <= 0.0 {
            errors.push(
                "training.gbm: n_estimators, max_depth and learning_rate must be > 0".to_string(),
            );
        }
        if t.gbm.min_samples_leaf == 0 {
            errors.push("training.gbm.min_samples_leaf must be > 0".to_string());
        }

        let d = &self.decisions;
        if d.mean_reversion_rule.window < 2 || d.mean_reversion_rule.z_threshold <= 0.0 {
            errors.push("decisions.mean_reversion_rule: window >= 2 and z_threshold > 0".to_string());
        }
        if d.momentum_rule.dead_band_pct < 0.0 {
            errors.push("decisions.momentum_rule.dead_band_pct must be >= 0".to_string());
        }
        let tr = &d.trend_rule;
        if !(tr.fast_span < tr.medium_span && tr.medium_span < tr.slow_span) {
            errors.push("decisions.trend_rule: spans must satisfy fast < medium < slow".to_string());
        }
        if tr.window == 0 {
            errors.push("decisions.trend_rule.window must be > 0".to_string());
        }
        if d.learned_mean_reversion.buy_threshold <= d.learned_mean_reversion.sell_threshold {
            errors.push("decisions.learned_mean_reversion: buy_threshold must exceed sell_threshold".to_string());
        }
        if d.learned_trend.buy_threshold <= d.learned_trend.sell_threshold {
            errors.push("decisions.learned_trend: buy_threshold must exceed sell_threshold".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub table: String,
    pub row_limit: u32,
    pub timeout_secs: u64,
    pub lookback_days: i64,
    pub min_rows: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            table: "stock_market_history".to_string(),
            row_limit: 1200,
            timeout_secs: 30,
            lookback_days: 365 * 2,
            min_rows: 60,
        }
    }
}

impl HistorySettings {
    fn fill_credentials_from_env(&mut self) {
        if self.supabase_url.is_none() {
            self.supabase_url = first_env(&["SUPABASE_URL", "VITE_SUPABASE_URL"]);
        }
        if self.supabase_anon_key.is_none() {
            self.supabase_anon_key = first_env(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]);
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub zscore_window: usize,
    pub roc_period: usize,
    pub rsi_period: usize,
    pub ema_fast_span: usize,
    pub ema_medium_span: usize,
    pub ema_slow_span: usize,
    pub momentum_period: usize,
    pub atr_period: usize,
    pub horizon: usize,
    pub min_mean_reversion_rows: usize,
    pub min_trend_rows: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            zscore_window: 20,
            roc_period: 5,
            rsi_period: 14,
            ema_fast_span: 20,
            ema_medium_span: 50,
            ema_slow_span: 100,
            momentum_period: 5,
            atr_period: 14,
            horizon: 5,
            min_mean_reversion_rows: 100,
            min_trend_rows: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub train_fraction: f64,
    pub logistic: LogisticParams,
    pub gbm: GbmParams,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            logistic: LogisticParams::default(),
            gbm: GbmParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Inverse regularization strength, as in `C` of the usual formulation
    pub inverse_regularization: f64,
    pub balanced_class_weights: bool,
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.5,
            inverse_regularization: 1.0,
            balanced_class_weights: true,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_leaf: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub dir: PathBuf,
    pub classifier_file: String,
    pub regressor_file: String,
    pub blob_file: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ml-models"),
            classifier_file: "mean_reversion_model.json".to_string(),
            regressor_file: "trend_model.json".to_string(),
            blob_file: "trend_model.bin".to_string(),
        }
    }
}

impl ArtifactSettings {
    pub fn classifier_path(&self) -> PathBuf {
        self.dir.join(&self.classifier_file)
    }

    pub fn regressor_path(&self) -> PathBuf {
        self.dir.join(&self.regressor_file)
    }

    pub fn blob_path(&self) -> PathBuf {
        self.dir.join(&self.blob_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionSettings {
    pub mean_reversion_rule: MeanReversionRuleParams,
    pub momentum_rule: MomentumRuleParams,
    pub trend_rule: TrendRuleParams,
    pub learned_mean_reversion: SignalThresholds,
    pub learned_trend: SignalThresholds,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            mean_reversion_rule: MeanReversionRuleParams::default(),
            momentum_rule: MomentumRuleParams::default(),
            trend_rule: TrendRuleParams::default(),
            learned_mean_reversion: SignalThresholds::mean_reversion(),
            learned_trend: SignalThresholds::trend(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionRuleParams {
    pub window: usize,
    pub z_threshold: f64,
}

impl Default for MeanReversionRuleParams {
    fn default() -> Self {
        Self {
            window: 20,
            z_threshold: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumRuleParams {
    /// Dead-band as a fraction of the previous price
    pub dead_band_pct: f64,
}

impl Default for MomentumRuleParams {
    fn default() -> Self {
        Self {
            dead_band_pct: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendRuleParams {
    pub fast_span: usize,
    pub medium_span: usize,
    pub slow_span: usize,
    pub window: usize,
}

impl Default for TrendRuleParams {
    fn default() -> Self {
        Self {
            fast_span: 20,
            medium_span: 50,
            slow_span: 200,
            window: 200,
        }
    }
}

/// Inclusive decision boundaries for a learned signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl SignalThresholds {
    pub fn mean_reversion() -> Self {
        Self {
            buy_threshold: 0.58,
            sell_threshold: 0.42,
        }
    }

    pub fn trend() -> Self {
        Self {
            buy_threshold: 0.0025,
            sell_threshold: -0.001,
        }
    }
}
