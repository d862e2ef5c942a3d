pub mod mean_reversion;
pub mod momentum;
pub mod trend_follower;
pub mod learned;
pub mod runner;

pub use mean_reversion::MeanReversionBot;
pub use momentum::MomentumBot;
pub use trend_follower::TrendFollowerBot;
pub use learned::{MlMeanReversionBot, MlTrendBot};
pub use runner::BotKind;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::types::Decision;

/// A stateless mapping from one typed market context to one decision
pub trait DecisionBot {
    type Context;

    fn name(&self) -> &'static str;

    fn decide(&self, ctx: &Self::Context) -> Decision;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("{field} must lie in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
    },
    #[error("buyThreshold must be greater than sellThreshold")]
    InvertedThresholds,
}

/// Cash and inventory shared by the rule bots. Exact decimal arithmetic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub cash: Decimal,
    pub qty_held: Decimal,
    pub lot_size: Decimal,
}

impl AccountState {
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.cash < Decimal::ZERO {
            return Err(ContextError::Negative("cash"));
        }
        if self.qty_held < Decimal::ZERO {
            return Err(ContextError::Negative("qtyHeld"));
        }
        if self.lot_size < Decimal::ZERO {
            return Err(ContextError::Negative("lotSize"));
        }
        Ok(())
    }

    /// Whether one lot at `price` fits in the available cash
    pub fn can_afford(&self, price: f64) -> bool {
        match Decimal::try_from(price) {
            Ok(price) => price
                .checked_mul(self.lot_size)
                .is_some_and(|cost| self.cash >= cost),
            Err(_) => false,
        }
    }

    pub fn holds_lot(&self) -> bool {
        self.qty_held >= self.lot_size
    }
}

/// Recent closes, oldest first, plus the account
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosesContext {
    pub closes: Vec<f64>,
    #[serde(flatten)]
    pub account: AccountState,
}

impl ClosesContext {
    pub fn validate(&self) -> Result<(), ContextError> {
        validate_closes(&self.closes)?;
        self.account.validate()
    }
}

/// Checks every close is finite and strictly positive
pub(crate) fn validate_closes(closes: &[f64]) -> Result<(), ContextError> {
    for close in closes {
        if !close.is_finite() {
            return Err(ContextError::NonFinite("closes"));
        }
        if *close <= 0.0 {
            return Err(ContextError::NonPositive("closes"));
        }
    }
    Ok(())
}
