use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::learned::{PredictedReturnContext, ProbabilityContext};
use super::momentum::MomentumContext;
use super::{
    validate_closes, ClosesContext, DecisionBot, MeanReversionBot, MlMeanReversionBot, MlTrendBot,
    MomentumBot, TrendFollowerBot,
};
use crate::config::DecisionSettings;
use crate::ml::{ArtifactSerializer, FeatureEngine, ModelVariant};
use crate::types::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BotKind {
    MeanReversion,
    Momentum,
    TrendFollower,
    MlMeanReversion,
    MlTrend,
}

impl fmt::Display for BotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BotKind::MeanReversion => "mean-reversion",
            BotKind::Momentum => "momentum",
            BotKind::TrendFollower => "trend-follower",
            BotKind::MlMeanReversion => "ml-mean-reversion",
            BotKind::MlTrend => "ml-trend",
        };
        write!(f, "{}", name)
    }
}

fn parse<T: DeserializeOwned>(input: &str, what: &str) -> Result<T> {
    serde_json::from_str(input).with_context(|| format!("malformed {} request", what))
}

/// Parses one request for `kind`, validates it and returns the decision
pub fn decide(kind: BotKind, input: &str, settings: &DecisionSettings) -> Result<Decision> {
    let decision = match kind {
        BotKind::MeanReversion => {
            let ctx: ClosesContext = parse(input, "mean-reversion")?;
            ctx.validate()?;
            MeanReversionBot::new(settings.mean_reversion_rule.clone()).decide(&ctx)
        }
        BotKind::Momentum => {
            let ctx: MomentumContext = parse(input, "momentum")?;
            ctx.validate()?;
            MomentumBot::new(settings.momentum_rule.clone()).decide(&ctx)
        }
        BotKind::TrendFollower => {
            let ctx: ClosesContext = parse(input, "trend-follower")?;
            ctx.validate()?;
            TrendFollowerBot::new(settings.trend_rule.clone()).decide(&ctx)
        }
        BotKind::MlMeanReversion => {
            let ctx: ProbabilityContext = parse(input, "ml-mean-reversion")?;
            ctx.validate()?;
            MlMeanReversionBot::new(settings.learned_mean_reversion).decide(&ctx)
        }
        BotKind::MlTrend => {
            let ctx: PredictedReturnContext = parse(input, "ml-trend")?;
            ctx.validate()?;
            MlTrendBot::new(settings.learned_trend).decide(&ctx)
        }
    };
    debug!("{} -> {}", kind, decision.action);
    Ok(decision)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub features: Vec<f64>,
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub probability: f64,
    pub ticker: String,
}

/// Up-move probability from the published classifier artifact
pub fn score(input: &str, default_artifact: &Path) -> Result<ScoreResponse> {
    let request: ScoreRequest = parse(input, "score")?;
    if let Some(index) = request.features.iter().position(|v| !v.is_finite()) {
        return Err(anyhow!("feature {} is not a finite number", index));
    }
    let path = request.artifact_path.as_deref().unwrap_or(default_artifact);
    let artifact = ArtifactSerializer::load_classifier(path)?;
    let probability = artifact.predict_probability(&request.features)?;
    Ok(ScoreResponse {
        probability,
        ticker: artifact.best_ticker,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureRequest {
    pub closes: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResponse {
    pub feature_names: Vec<String>,
    pub features: Vec<f64>,
}

/// Latest feature row for a closes window, built like the training frames
pub fn features(variant: ModelVariant, input: &str, engine: &FeatureEngine) -> Result<FeatureResponse> {
    let request: FeatureRequest = parse(input, "features")?;
    validate_closes(&request.closes)?;
    let features = engine
        .latest_features(variant, &request.closes)
        .ok_or_else(|| anyhow!("{} closes are not enough to derive {} features", request.closes.len(), variant))?;
    Ok(FeatureResponse {
        feature_names: variant.feature_names(),
        features,
    })
}
