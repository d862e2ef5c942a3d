use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{rows_to_points, HistoryRow, PriceHistorySource};
use crate::types::PricePoint;

/// Offline source: `{dir}/{TICKER}.json` holding the same row array the REST store returns
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    dir: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PriceHistorySource for JsonDirectorySource {
    async fn fetch_history(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let path = self.dir.join(format!("{}.json", ticker));
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let rows: Vec<HistoryRow> =
            serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(rows_to_points(&rows))
    }
}
