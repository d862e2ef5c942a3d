/// Recursive exponential moving average, alpha = 2 / (span + 1),
/// seeded with the first observed value.
#[derive(Debug, Clone)]
pub struct EMA {
    alpha: f64,
    value: Option<f64>,
}

impl EMA {
    pub fn new(span: usize) -> Self {
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * price + (1.0 - self.alpha) * prev,
            None => price,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

pub fn ema_series(prices: &[f64], span: usize) -> Vec<f64> {
    let mut ema = EMA::new(span);
    prices.iter().map(|p| ema.update(*p)).collect()
}

/// EMA over the whole slice, `None` for an empty slice
pub fn ema_last(prices: &[f64], span: usize) -> Option<f64> {
    let mut ema = EMA::new(span);
    prices.iter().for_each(|p| {
        ema.update(*p);
    });
    ema.value()
}
