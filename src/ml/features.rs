use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{Array1, Array2};
use thiserror::Error;
use tracing::debug;

use super::dataset::Dataset;
use super::ModelVariant;
use crate::config::FeatureSettings;
use crate::indicators::{
    close_atr_series, ema_series, forward_return, is_flat, pct_change, rolling_mean,
    rolling_sample_std, rsi_series,
};
use crate::types::PriceSeries;

pub const MEAN_REVERSION_FEATURES: [&str; 4] = ["zscore", "pct_change", "roc5", "rsi14"];
pub const TREND_FEATURES: [&str; 5] = ["ema_diff_short", "ema_diff_long", "momentum5", "rsi14", "atr"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("insufficient data: {rows} usable rows, {required} required")]
    InsufficientData { rows: usize, required: usize },
}

/// Row-aligned features plus the label/target column for one ticker.
/// Every cell is finite; rows with any missing input were dropped.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub timestamps: Vec<DateTime<Utc>>,
    pub dataset: Dataset,
}

impl FeatureFrame {
    /// Date of the first row after `train_rows`
    pub fn validation_start(&self, train_rows: usize) -> Option<NaiveDate> {
        self.timestamps.get(train_rows).map(|t| t.date_naive())
    }
}

/// Derives indicator columns from closes. Training frames and runtime
/// feature vectors come from the same column builders.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    settings: FeatureSettings,
}

impl FeatureEngine {
    pub fn new(settings: FeatureSettings) -> Self {
        Self { settings }
    }

    pub fn mean_reversion_frame(&self, series: &PriceSeries) -> Result<FeatureFrame, FeatureError> {
        let closes = series.closes();
        let columns = self.mean_reversion_columns(&closes);
        let label: Vec<Option<f64>> = forward_return(&closes, 1)
            .into_iter()
            .map(|r| r.map(|r| if r > 0.0 { 1.0 } else { 0.0 }))
            .collect();

        self.assemble(
            series,
            ModelVariant::MeanReversion,
            &columns,
            &label,
            self.settings.min_mean_reversion_rows,
        )
    }

    pub fn trend_frame(&self, series: &PriceSeries) -> Result<FeatureFrame, FeatureError> {
        let closes = series.closes();
        let columns = self.trend_columns(&closes);
        let target = forward_return(&closes, self.settings.horizon);

        self.assemble(
            series,
            ModelVariant::Trend,
            &columns,
            &target,
            self.settings.min_trend_rows,
        )
    }

    /// Feature row for the most recent close, `None` while any column is warming up
    pub fn latest_features(&self, variant: ModelVariant, closes: &[f64]) -> Option<Vec<f64>> {
        let columns = match variant {
            ModelVariant::MeanReversion => self.mean_reversion_columns(closes),
            ModelVariant::Trend => self.trend_columns(closes),
        };
        let last = closes.len().checked_sub(1)?;
        columns
            .iter()
            .map(|col| col[last].filter(|v| v.is_finite()))
            .collect()
    }

    fn mean_reversion_columns(&self, closes: &[f64]) -> Vec<Vec<Option<f64>>> {
        let s = &self.settings;
        let means = rolling_mean(closes, s.zscore_window);
        let stds = rolling_sample_std(closes, s.zscore_window);

        let zscore: Vec<Option<f64>> = closes
            .iter()
            .zip(means.iter().zip(stds.iter()))
            .map(|(close, (mean, std))| match (mean, std) {
                (Some(mean), Some(std)) if is_flat(*std, *mean) => Some(0.0),
                (Some(mean), Some(std)) => Some((close - mean) / std),
                _ => None,
            })
            .collect();

        vec![
            zscore,
            pct_change(closes, 1),
            pct_change(closes, s.roc_period),
            rsi_series(closes, s.rsi_period),
        ]
    }

    fn trend_columns(&self, closes: &[f64]) -> Vec<Vec<Option<f64>>> {
        let s = &self.settings;
        let fast = ema_series(closes, s.ema_fast_span);
        let medium = ema_series(closes, s.ema_medium_span);
        let slow = ema_series(closes, s.ema_slow_span);

        let diff_short = fast.iter().zip(&medium).map(|(f, m)| Some(f - m)).collect();
        let diff_long = medium.iter().zip(&slow).map(|(m, s)| Some(m - s)).collect();

        vec![
            diff_short,
            diff_long,
            pct_change(closes, s.momentum_period),
            rsi_series(closes, s.rsi_period),
            close_atr_series(closes, s.atr_period),
        ]
    }

    fn assemble(
        &self,
        series: &PriceSeries,
        variant: ModelVariant,
        columns: &[Vec<Option<f64>>],
        target: &[Option<f64>],
        min_rows: usize,
    ) -> Result<FeatureFrame, FeatureError> {
        let stamps = series.timestamps();
        let n_features = columns.len();

        let mut flat = Vec::new();
        let mut targets = Vec::new();
        let mut timestamps = Vec::new();

        for i in 0..stamps.len() {
            let row: Option<Vec<f64>> = columns
                .iter()
                .map(|col| col[i].filter(|v| v.is_finite()))
                .collect();
            let y = target[i].filter(|v| v.is_finite());
            if let (Some(row), Some(y)) = (row, y) {
                flat.extend(row);
                targets.push(y);
                timestamps.push(stamps[i]);
            }
        }

        let rows = targets.len();
        if rows < min_rows {
            return Err(FeatureError::InsufficientData {
                rows,
                required: min_rows,
            });
        }

        debug!(
            "{}: {} {} feature rows from {} closes",
            series.ticker(),
            rows,
            variant,
            series.len()
        );

        let features = Array2::from_shape_fn((rows, n_features), |(i, j)| flat[i * n_features + j]);

        Ok(FeatureFrame {
            timestamps,
            dataset: Dataset::new(
                variant.feature_names(),
                features,
                Array1::from_vec(targets),
            ),
        })
    }
}
