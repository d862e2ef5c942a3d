use tracing::debug;

use super::{ClosesContext, DecisionBot};
use crate::config::TrendRuleParams;
use crate::indicators::ema_last;
use crate::types::{Action, Decision};

/// Fast/medium/slow EMA alignment over the trailing window
pub struct TrendFollowerBot {
    params: TrendRuleParams,
}

impl TrendFollowerBot {
    pub fn new(params: TrendRuleParams) -> Self {
        Self { params }
    }

    /// (fast, medium, slow) over the last `window` closes, `None` while short
    pub fn emas(&self, closes: &[f64]) -> Option<(f64, f64, f64)> {
        let p = &self.params;
        if closes.len() < p.window {
            return None;
        }
        let recent = &closes[closes.len() - p.window..];
        Some((
            ema_last(recent, p.fast_span)?,
            ema_last(recent, p.medium_span)?,
            ema_last(recent, p.slow_span)?,
        ))
    }
}

impl DecisionBot for TrendFollowerBot {
    type Context = ClosesContext;

    fn name(&self) -> &'static str {
        "trend-follower"
    }

    fn decide(&self, ctx: &ClosesContext) -> Decision {
        let (Some((fast, medium, slow)), Some(&latest)) = (self.emas(&ctx.closes), ctx.closes.last())
        else {
            return Decision::new(Action::Hold, "Not enough history for the slow EMA; staying flat.");
        };
        debug!("{}: ema {:.4} / {:.4} / {:.4}", self.name(), fast, medium, slow);

        if fast > medium && medium > slow && ctx.account.can_afford(latest) {
            return Decision::new(Action::Buy, "EMAs aligned bullishly, entering the trend.");
        }
        if fast < medium && medium < slow && ctx.account.holds_lot() {
            return Decision::new(Action::Sell, "EMAs aligned bearishly, exiting the position.");
        }
        Decision::new(Action::Hold, "EMAs mixed, staying flat.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::fixtures::flush;

    fn bot() -> TrendFollowerBot {
        TrendFollowerBot::new(TrendRuleParams::default())
    }

    fn ctx(closes: Vec<f64>) -> ClosesContext {
        ClosesContext {
            closes,
            account: flush(),
        }
    }

    #[test]
    fn test_short_history_always_holds() {
        let rising: Vec<f64> = (0..199).map(|i| 100.0 + i as f64).collect();
        assert_eq!(bot().decide(&ctx(rising)).action, Action::Hold);
    }

    #[test]
    fn test_steady_uptrend_buys() {
        let rising: Vec<f64> = (0..250).map(|i| 100.0 + i as f64).collect();
        assert_eq!(bot().decide(&ctx(rising)).action, Action::Buy);
    }

    #[test]
    fn test_steady_downtrend_sells() {
        let falling: Vec<f64> = (0..250).map(|i| 400.0 - i as f64).collect();
        assert_eq!(bot().decide(&ctx(falling)).action, Action::Sell);
    }

    #[test]
    fn test_flat_market_holds() {
        assert_eq!(bot().decide(&ctx(vec![50.0; 220])).action, Action::Hold);
    }
}
