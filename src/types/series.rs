use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("{ticker}: close {close} at {at} is not a positive finite number")]
    InvalidClose { ticker: String, at: DateTime<Utc>, close: f64 },

    #[error("{ticker}: timestamps must be strictly increasing ({previous} then {current})")]
    NotIncreasing {
        ticker: String,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

/// One observed close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub at: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(at: DateTime<Utc>, close: f64) -> Self {
        Self { at, close }
    }

    /// Accepts `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` timestamp.
    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|ts| ts.and_utc())
    }

    fn is_valid_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Close-price history for a single ticker.
/// Timestamps are strictly increasing and every close is finite and positive.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build from already ordered points, rejecting anything that breaks the invariants
    pub fn new(ticker: &str, points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        for point in &points {
            if !point.is_valid_close() {
                return Err(SeriesError::InvalidClose {
                    ticker: ticker.to_string(),
                    at: point.at,
                    close: point.close,
                });
            }
        }
        for pair in points.windows(2) {
            if pair[1].at <= pair[0].at {
                return Err(SeriesError::NotIncreasing {
                    ticker: ticker.to_string(),
                    previous: pair[0].at,
                    current: pair[1].at,
                });
            }
        }
        Ok(Self {
            ticker: ticker.to_string(),
            points,
        })
    }

    /// Build from raw store rows: sorts by time, drops unusable closes and
    /// keeps the last row seen for a duplicated timestamp.
    pub fn from_unordered(ticker: &str, mut points: Vec<PricePoint>) -> Self {
        points.retain(PricePoint::is_valid_close);
        points.sort_by_key(|p| p.at);

        let mut cleaned: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match cleaned.last_mut() {
                Some(last) if last.at == point.at => *last = point,
                _ => cleaned.push(point),
            }
        }

        Self {
            ticker: ticker.to_string(),
            points: cleaned,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.at).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Points at or after `cutoff`
    pub fn since(&self, cutoff: DateTime<Utc>) -> Self {
        let start = self.points.partition_point(|p| p.at < cutoff);
        Self {
            ticker: self.ticker.clone(),
            points: self.points[start..].to_vec(),
        }
    }
}
