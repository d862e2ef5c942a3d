use serde::Deserialize;

use super::{AccountState, ContextError, DecisionBot};
use crate::config::MomentumRuleParams;
use crate::types::{Action, Decision};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentumContext {
    pub latest_price: f64,
    pub previous_price: f64,
    #[serde(flatten)]
    pub account: AccountState,
}

impl MomentumContext {
    pub fn validate(&self) -> Result<(), ContextError> {
        super::validate_closes(&[self.previous_price, self.latest_price])?;
        self.account.validate()
    }
}

/// One-step price change against a dead-band proportional to the previous price
pub struct MomentumBot {
    params: MomentumRuleParams,
}

impl MomentumBot {
    pub fn new(params: MomentumRuleParams) -> Self {
        Self { params }
    }
}

impl DecisionBot for MomentumBot {
    type Context = MomentumContext;

    fn name(&self) -> &'static str {
        "momentum"
    }

    fn decide(&self, ctx: &MomentumContext) -> Decision {
        let delta = ctx.latest_price - ctx.previous_price;
        let band = self.params.dead_band_pct * ctx.previous_price;

        if delta > band && ctx.account.can_afford(ctx.latest_price) {
            return Decision::new(Action::Buy, "Price is rising and we can afford one extra lot.");
        }
        if delta < -band && ctx.account.holds_lot() {
            return Decision::new(Action::Sell, "Price is falling and we can reduce exposure.");
        }
        Decision::new(Action::Hold, "No strong signal, we maintain the current position.")
    }
}
