pub mod file;
pub mod supabase;

pub use file::JsonDirectorySource;
pub use supabase::SupabaseHistory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::HistorySettings;
use crate::types::{PricePoint, PriceSeries};

/// Remote store of daily closes per ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Raw rows in any order; unparseable rows are already dropped
    async fn fetch_history(&self, ticker: &str) -> anyhow::Result<Vec<PricePoint>>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("no price rows returned")]
    Empty,
    #[error("only {rows} rows inside the lookback window, {required} required")]
    TooFewRows { rows: usize, required: usize },
}

/// One row of `stock_market_history`. Closes arrive as numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRow {
    pub record_date: String,
    pub close_value: serde_json::Value,
}

impl HistoryRow {
    pub fn to_point(&self) -> Option<PricePoint> {
        let at = PricePoint::parse_timestamp(&self.record_date)?;
        let close = match &self.close_value {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        Some(PricePoint::new(at, close))
    }
}

pub fn rows_to_points(rows: &[HistoryRow]) -> Vec<PricePoint> {
    rows.iter().filter_map(HistoryRow::to_point).collect()
}

/// Cleans raw points, keeps the lookback window and applies the row gate
pub fn prepare_series(
    ticker: &str,
    points: Vec<PricePoint>,
    settings: &HistorySettings,
    now: DateTime<Utc>,
) -> Result<PriceSeries, HistoryError> {
    if points.is_empty() {
        return Err(HistoryError::Empty);
    }
    let cutoff = now - Duration::days(settings.lookback_days);
    let series = PriceSeries::from_unordered(ticker, points).since(cutoff);
    if series.len() < settings.min_rows {
        return Err(HistoryError::TooFewRows {
            rows: series.len(),
            required: settings.min_rows,
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_parsing_accepts_numbers_and_strings() {
        let rows: Vec<HistoryRow> = serde_json::from_str(
            r#"[
                {"record_date": "2024-01-02", "close_value": 101.5},
                {"record_date": "2024-01-03T00:00:00Z", "close_value": "102.25"},
                {"record_date": "2024-01-04", "close_value": "n/a"},
                {"record_date": "garbage", "close_value": 5},
                {"record_date": "2024-01-05", "close_value": null}
            ]"#,
        )
        .unwrap();
        let points = rows_to_points(&rows);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, 101.5);
        assert_eq!(points[1].close, 102.25);
    }

    #[test]
    fn test_prepare_applies_lookback_and_gate() {
        let now = PricePoint::parse_timestamp("2024-12-31").unwrap();
        let settings = HistorySettings::default();

        // 800 daily rows ending at `now`, only 731 fall inside 730 days
        let points: Vec<PricePoint> = (0..800)
            .map(|i| PricePoint::new(now - Duration::days(799 - i), 100.0 + i as f64))
            .collect();
        let series = prepare_series("AAPL", points, &settings, now).unwrap();
        assert_eq!(series.len(), 731);

        let few: Vec<PricePoint> = (0..59)
            .map(|i| PricePoint::new(now - Duration::days(i), 10.0))
            .collect();
        assert_eq!(
            prepare_series("AAPL", few, &settings, now).unwrap_err(),
            HistoryError::TooFewRows { rows: 59, required: 60 }
        );
        assert_eq!(
            prepare_series("AAPL", Vec::new(), &settings, now).unwrap_err(),
            HistoryError::Empty
        );
    }

    #[test]
    fn test_prepare_drops_bad_closes_before_gating() {
        let now = PricePoint::parse_timestamp("2024-06-30").unwrap();
        let mut points: Vec<PricePoint> = (0..60)
            .map(|i| PricePoint::new(now - Duration::days(i), 50.0))
            .collect();
        points[3].close = -1.0;
        let err = prepare_series("X", points, &HistorySettings::default(), now).unwrap_err();
        assert_eq!(err, HistoryError::TooFewRows { rows: 59, required: 60 });
    }
}
