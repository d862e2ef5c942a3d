use chrono::{Duration, Utc};
use std::path::PathBuf;

use crate::types::{PricePoint, PriceSeries};

/// Deterministic wavy uptrend, one close per day
pub fn synthetic_series(ticker: &str, n: usize) -> PriceSeries {
    series_with_phase(ticker, n, 0.0)
}

/// Same shape as `synthetic_series`, shifted so different tickers differ
pub fn series_with_phase(ticker: &str, n: usize, phase: f64) -> PriceSeries {
    let start = PricePoint::parse_timestamp("2023-01-01").unwrap();
    let points = (0..n)
        .map(|i| {
            PricePoint::new(start + Duration::days(i as i64), close_at(i as f64, phase))
        })
        .collect();
    PriceSeries::new(ticker, points).unwrap()
}

/// Points ending today, so lookback cutoffs keep all of them
pub fn recent_points(n: usize, phase: f64) -> Vec<PricePoint> {
    let end = Utc::now();
    (0..n)
        .map(|i| {
            let age = (n - 1 - i) as i64;
            PricePoint::new(end - Duration::days(age), close_at(i as f64, phase))
        })
        .collect()
}

fn close_at(t: f64, phase: f64) -> f64 {
    100.0 + 0.05 * t + 4.0 * (t * 0.3 + phase).sin() + 2.0 * (t * 0.11 + phase).cos()
}

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ml-trading-bots-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
