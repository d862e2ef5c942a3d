use tracing::debug;

use super::{ClosesContext, DecisionBot};
use crate::config::MeanReversionRuleParams;
use crate::indicators::{is_flat, sma, stddev};
use crate::types::{Action, Decision};

/// Z-score of the latest close against the trailing window.
/// Buys far below the mean, sells far above it.
pub struct MeanReversionBot {
    params: MeanReversionRuleParams,
}

impl MeanReversionBot {
    pub fn new(params: MeanReversionRuleParams) -> Self {
        Self { params }
    }

    /// `None` while the window is short or flat
    pub fn zscore(&self, closes: &[f64]) -> Option<f64> {
        let window = self.params.window;
        let latest = *closes.last()?;
        let mean = sma(closes, window)?;
        let std = stddev(closes, window)?;
        if is_flat(std, mean) {
            return None;
        }
        Some((latest - mean) / std)
    }
}

impl DecisionBot for MeanReversionBot {
    type Context = ClosesContext;

    fn name(&self) -> &'static str {
        "mean-reversion"
    }

    fn decide(&self, ctx: &ClosesContext) -> Decision {
        if ctx.closes.len() < self.params.window {
            return Decision::new(
                Action::Hold,
                &format!("Fewer than {} closes to score; holding.", self.params.window),
            );
        }
        let Some(z) = self.zscore(&ctx.closes) else {
            return Decision::new(Action::Hold, "Not enough price variation to score; holding.");
        };
        let Some(&latest) = ctx.closes.last() else {
            return Decision::new(Action::Hold, "No prices supplied; holding.");
        };
        debug!("{}: z-score {:.3}", self.name(), z);

        let threshold = self.params.z_threshold;
        if z <= -threshold && ctx.account.can_afford(latest) {
            return Decision::new(
                Action::Buy,
                "Price trades far below the 20-day mean; buying to revert.",
            );
        }
        if z >= threshold && ctx.account.holds_lot() {
            return Decision::new(
                Action::Sell,
                "Price trades far above the 20-day mean; selling to mean revert.",
            );
        }
        Decision::new(Action::Hold, "Z-score within band; holding current exposure.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::fixtures::{broke_and_flat, flush};

    fn bot() -> MeanReversionBot {
        MeanReversionBot::new(MeanReversionRuleParams::default())
    }

    fn ctx(closes: Vec<f64>, account: crate::bots::AccountState) -> ClosesContext {
        ClosesContext { closes, account }
    }

    #[test]
    fn test_identical_closes_hold() {
        let decision = bot().decide(&ctx(vec![42.0; 20], flush()));
        assert_eq!(decision.action, Action::Hold);
    }

    #[test]
    fn test_sharp_drop_buys() {
        let mut closes = vec![100.0; 19];
        closes.push(80.0);
        let decision = bot().decide(&ctx(closes, flush()));
        assert_eq!(decision.action, Action::Buy);
    }

    #[test]
    fn test_sharp_rise_sells_only_when_holding() {
        let mut closes = vec![100.0; 19];
        closes.push(120.0);
        assert_eq!(bot().decide(&ctx(closes.clone(), flush())).action, Action::Sell);
        assert_eq!(bot().decide(&ctx(closes, broke_and_flat())).action, Action::Hold);
    }

    #[test]
    fn test_buy_needs_cash() {
        let mut closes = vec![100.0; 19];
        closes.push(80.0);
        assert_eq!(bot().decide(&ctx(closes, broke_and_flat())).action, Action::Hold);
    }

    #[test]
    fn test_short_history_holds() {
        let decision = bot().decide(&ctx(vec![100.0, 50.0, 10.0], flush()));
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, "Fewer than 20 closes to score; holding.");
    }

    #[test]
    fn test_flat_window_reports_no_variation() {
        let decision = bot().decide(&ctx(vec![42.0; 25], flush()));
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, "Not enough price variation to score; holding.");
    }

    #[test]
    fn test_only_last_window_counts() {
        // an old outlier outside the 20-close window has no effect
        let mut closes = vec![1.0];
        closes.extend(vec![100.0; 19]);
        closes.push(100.0);
        assert_eq!(bot().decide(&ctx(closes, flush())).action, Action::Hold);
    }
}
