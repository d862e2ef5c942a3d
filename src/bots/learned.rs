use serde::Deserialize;
use std::fmt;
use tracing::debug;

use super::{ContextError, DecisionBot};
use crate::config::SignalThresholds;
use crate::types::{Action, Decision};

/// Audit copy of the classifier inputs that produced the probability
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeanReversionFeatures {
    pub zscore: f64,
    pub pct_change: f64,
    pub roc5: f64,
    pub rsi14: f64,
}

/// Audit copy of the regressor inputs that produced the prediction
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrendFeatures {
    pub ema_diff_short: f64,
    pub ema_diff_long: f64,
    pub momentum5: f64,
    pub rsi14: f64,
    pub atr: f64,
}

impl fmt::Display for MeanReversionFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zscore={:.3} pct_change={:.4} roc5={:.4} rsi14={:.1}",
            self.zscore, self.pct_change, self.roc5, self.rsi14
        )
    }
}

impl fmt::Display for TrendFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ema_diff_short={:.4} ema_diff_long={:.4} momentum5={:.4} rsi14={:.1} atr={:.4}",
            self.ema_diff_short, self.ema_diff_long, self.momentum5, self.rsi14, self.atr
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityContext {
    pub probability: f64,
    #[serde(default)]
    pub features: Option<MeanReversionFeatures>,
    #[serde(default)]
    pub buy_threshold: Option<f64>,
    #[serde(default)]
    pub sell_threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedReturnContext {
    pub predicted_return: f64,
    #[serde(default)]
    pub features: Option<TrendFeatures>,
    #[serde(default)]
    pub buy_threshold: Option<f64>,
    #[serde(default)]
    pub sell_threshold: Option<f64>,
}

impl ProbabilityContext {
    pub fn validate(&self) -> Result<(), ContextError> {
        if !self.probability.is_finite() {
            return Err(ContextError::NonFinite("probability"));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ContextError::OutOfRange {
                field: "probability",
                min: "0".to_string(),
                max: "1".to_string(),
            });
        }
        validate_overrides(self.buy_threshold, self.sell_threshold)
    }
}

impl PredictedReturnContext {
    pub fn validate(&self) -> Result<(), ContextError> {
        if !self.predicted_return.is_finite() {
            return Err(ContextError::NonFinite("predictedReturn"));
        }
        validate_overrides(self.buy_threshold, self.sell_threshold)
    }
}

fn validate_overrides(buy: Option<f64>, sell: Option<f64>) -> Result<(), ContextError> {
    if buy.is_some_and(|v| !v.is_finite()) {
        return Err(ContextError::NonFinite("buyThreshold"));
    }
    if sell.is_some_and(|v| !v.is_finite()) {
        return Err(ContextError::NonFinite("sellThreshold"));
    }
    if let (Some(buy), Some(sell)) = (buy, sell) {
        if buy <= sell {
            return Err(ContextError::InvertedThresholds);
        }
    }
    Ok(())
}

/// Request overrides win over configured thresholds
fn effective(defaults: SignalThresholds, buy: Option<f64>, sell: Option<f64>) -> SignalThresholds {
    SignalThresholds {
        buy_threshold: buy.unwrap_or(defaults.buy_threshold),
        sell_threshold: sell.unwrap_or(defaults.sell_threshold),
    }
}

/// Inclusive toward the named action
fn classify(signal: f64, thresholds: SignalThresholds) -> Action {
    if signal >= thresholds.buy_threshold {
        Action::Buy
    } else if signal <= thresholds.sell_threshold {
        Action::Sell
    } else {
        Action::Hold
    }
}

pub struct MlMeanReversionBot {
    thresholds: SignalThresholds,
}

impl MlMeanReversionBot {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }
}

impl DecisionBot for MlMeanReversionBot {
    type Context = ProbabilityContext;

    fn name(&self) -> &'static str {
        "ml-mean-reversion"
    }

    fn decide(&self, ctx: &ProbabilityContext) -> Decision {
        if let Some(features) = &ctx.features {
            debug!("{}: inputs {}", self.name(), features);
        }
        let thresholds = effective(self.thresholds, ctx.buy_threshold, ctx.sell_threshold);
        let action = classify(ctx.probability, thresholds);
        let reason = match action {
            Action::Buy => format!(
                "Up-move probability {:.3} at or above {:.3}; buying.",
                ctx.probability, thresholds.buy_threshold
            ),
            Action::Sell => format!(
                "Up-move probability {:.3} at or below {:.3}; selling.",
                ctx.probability, thresholds.sell_threshold
            ),
            Action::Hold => format!("Up-move probability {:.3} inside the band; holding.", ctx.probability),
        };
        Decision::new(action, &reason)
    }
}

pub struct MlTrendBot {
    thresholds: SignalThresholds,
}

impl MlTrendBot {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }
}

impl DecisionBot for MlTrendBot {
    type Context = PredictedReturnContext;

    fn name(&self) -> &'static str {
        "ml-trend"
    }

    fn decide(&self, ctx: &PredictedReturnContext) -> Decision {
        if let Some(features) = &ctx.features {
            debug!("{}: inputs {}", self.name(), features);
        }
        let thresholds = effective(self.thresholds, ctx.buy_threshold, ctx.sell_threshold);
        let action = classify(ctx.predicted_return, thresholds);
        let reason = match action {
            Action::Buy => format!(
                "Predicted return {:.4} clears the buy threshold; entering.",
                ctx.predicted_return
            ),
            Action::Sell => format!(
                "Predicted return {:.4} breaches the sell threshold; exiting.",
                ctx.predicted_return
            ),
            Action::Hold => format!("Predicted return {:.4} inside the band; holding.", ctx.predicted_return),
        };
        Decision::new(action, &reason)
    }
}
