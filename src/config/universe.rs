use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tickers the training run iterates over, crypto first then equities.
/// Order matters: it breaks ties during model selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerUniverse {
    pub crypto: Vec<String>,
    pub equities: Vec<String>,
}

impl Default for TickerUniverse {
    fn default() -> Self {
        Self {
            crypto: to_strings(&[
                "BTCUSD", "ETHUSD", "SOLUSD", "XRPUSD", "ADAUSD", "DOGEUSD", "LTCUSD", "BNBUSD",
                "DOTUSD", "AVAXUSD",
            ]),
            equities: to_strings(&[
                "AAPL", "MSFT", "AMZN", "META", "NVDA", "GOOGL", "TSLA", "NFLX", "ADBE", "INTC",
            ]),
        }
    }
}

impl TickerUniverse {
    /// Replace the configured lists with an explicit ordered list
    pub fn explicit(tickers: &[String]) -> Self {
        Self {
            crypto: Vec::new(),
            equities: tickers.to_vec(),
        }
    }

    pub fn tickers(&self) -> Vec<String> {
        self.crypto.iter().chain(self.equities.iter()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.crypto.len() + self.equities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.is_empty() {
            errors.push("universe must contain at least one ticker".to_string());
        }
        let mut seen = HashSet::new();
        for ticker in self.tickers() {
            if ticker.trim().is_empty() {
                errors.push("universe contains an empty ticker".to_string());
            } else if !seen.insert(ticker.clone()) {
                errors.push(format!("universe lists {} more than once", ticker));
            }
        }
        errors
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
