/// Close-only ATR approximation: rolling mean of absolute one-step changes.
#[derive(Debug, Clone)]
pub struct CloseATR {
    period: usize,
    prev_close: Option<f64>,
    ranges: Vec<f64>,
    value: Option<f64>,
}

impl CloseATR {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            ranges: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if let Some(prev) = self.prev_close {
            self.ranges.push((close - prev).abs());
            if self.ranges.len() > self.period {
                self.ranges.remove(0);
            }
            if self.period > 0 && self.ranges.len() == self.period {
                self.value = Some(self.ranges.iter().sum::<f64>() / self.period as f64);
            }
        }
        self.prev_close = Some(close);
        self.value
    }
}

pub fn close_atr_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut atr = CloseATR::new(period);
    closes.iter().map(|c| atr.update(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_after_period_deltas() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64 * 2.0).collect();
        let series = close_atr_series(&closes, 14);
        assert!(series[..14].iter().all(Option::is_none));
        assert_eq!(series[14], Some(2.0));
    }

    #[test]
    fn test_window_rolls() {
        let mut atr = CloseATR::new(2);
        atr.update(10.0);
        atr.update(11.0);
        assert_eq!(atr.update(14.0), Some(2.0));
        assert_eq!(atr.update(14.0), Some(1.5));
    }
}
