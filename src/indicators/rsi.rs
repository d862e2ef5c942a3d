/// Relative Strength Index with exponential smoothing (alpha = 1 / period).
///
/// The smoothed gain and loss start at zero on the first price, so the first
/// value is produced on the first one-step delta. A zero smoothed loss
/// resolves to 100 instead of dividing by zero; training features and the
/// runtime feature extraction both go through this type.
#[derive(Debug, Clone)]
pub struct RSI {
    alpha: f64,
    prev_price: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: 1.0 / period.max(1) as f64,
            prev_price: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price {
            let change = price - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            self.avg_gain = self.alpha * gain + (1.0 - self.alpha) * self.avg_gain;
            self.avg_loss = self.alpha * loss + (1.0 - self.alpha) * self.avg_loss;
            self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
        }

        self.prev_price = Some(price);
        self.value
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut rsi = RSI::new(period);
    prices.iter().map(|p| rsi.update(*p)).collect()
}
