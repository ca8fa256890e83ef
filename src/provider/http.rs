use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{EventRecord, OddsProvider};

/// Odds provider backed by an HTTP feed returning the standard event/odds
/// payload as a JSON array.
pub struct HttpOddsProvider {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpOddsProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpOddsProvider {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.to_string()),
        })
    }
}

#[async_trait]
impl OddsProvider for HttpOddsProvider {
    fn name(&self) -> &str {
        "http-odds-feed"
    }

    async fn fetch_events_and_odds(&self) -> Result<Vec<EventRecord>> {
        let url = match &self.api_key {
            Some(key) => format!("{}/events?apiKey={}", self.base_url, key),
            None => format!("{}/events", self.base_url),
        };
        debug!("Fetching events and odds from {}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Odds feed request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Odds feed error {}: {}", status, body);
        }

        let events: Vec<EventRecord> = resp
            .json()
            .await
            .context("Failed to parse odds feed response")?;
        Ok(events)
    }
}
