use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{rows_to_points, HistoryRow, PriceHistorySource};
use crate::config::HistorySettings;
use crate::types::PricePoint;

/// Reads closes from the Supabase REST endpoint of the history table
#[derive(Debug, Clone)]
pub struct SupabaseHistory {
    client: Client,
    base_url: String,
    anon_key: String,
    table: String,
    row_limit: u32,
}

impl SupabaseHistory {
    pub fn new(settings: &HistorySettings) -> Result<Self> {
        let base_url = settings
            .supabase_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("SUPABASE_URL is not configured"))?;
        let anon_key = settings
            .supabase_anon_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("SUPABASE_ANON_KEY is not configured"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            table: settings.table.clone(),
            row_limit: settings.row_limit,
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/rest/v1/{}?select=record_date,close_value&symbol=eq.{}&order=record_date.asc&limit={}",
            self.base_url, self.table, ticker, self.row_limit
        )
    }
}

#[async_trait]
impl PriceHistorySource for SupabaseHistory {
    async fn fetch_history(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let url = self.url(ticker);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("history request for {} failed ({}): {}", ticker, status, body));
        }

        let rows: Vec<HistoryRow> = resp.json().await?;
        let points = rows_to_points(&rows);
        debug!("{}: {} rows, {} usable", ticker, rows.len(), points.len());
        Ok(points)
    }
}
