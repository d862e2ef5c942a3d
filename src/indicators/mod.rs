pub mod ema;
pub mod rsi;
pub mod atr;

pub use ema::*;
pub use rsi::*;
pub use atr::*;

/// Relative floor under which a standard deviation counts as zero
pub const FLAT_STD_EPSILON: f64 = 1e-12;

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Population standard deviation of the last `period` values
pub fn stddev(values: &[f64], period: usize) -> Option<f64> {
    let mean = sma(values, period)?;
    let variance = values
        .iter()
        .rev()
        .take(period)
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / period as f64;
    Some(variance.sqrt())
}

/// True when `std` is zero relative to the magnitude of `mean`
pub fn is_flat(std: f64, mean: f64) -> bool {
    std <= FLAT_STD_EPSILON * mean.abs().max(1.0)
}

/// Trailing window mean, `None` until `window` values are available
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                sma(&values[..=i], window)
            }
        })
        .collect()
}

/// Trailing window sample standard deviation (n - 1 denominator)
pub fn rolling_sample_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let variance =
                slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            Some(variance.sqrt())
        })
        .collect()
}

/// `value[t] / value[t - periods] - 1`
pub fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if periods == 0 || i < periods {
                return None;
            }
            let base = values[i - periods];
            if base == 0.0 {
                None
            } else {
                Some(values[i] / base - 1.0)
            }
        })
        .collect()
}

/// `value[t + periods] / value[t] - 1`, `None` where the future is not observed
pub fn forward_return(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let future = values.get(i + periods)?;
            if periods == 0 || values[i] == 0.0 {
                None
            } else {
                Some(future / values[i] - 1.0)
            }
        })
        .collect()
}
