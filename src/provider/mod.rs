pub mod http;
pub mod mock;

pub use http::HttpOddsProvider;
pub use mock::{DeterministicMockOddsProvider, MockOddsProvider};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db::models::Side;

/// One bookmaker quote inside a provider event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsLine {
    pub book: String,
    #[serde(default = "default_market")]
    pub market: String,
    pub side: Side,
    /// American price (e.g. -110, +145)
    pub price: i32,
    pub timestamp: DateTime<Utc>,
}

fn default_market() -> String {
    "moneyline".to_string()
}

/// One pre-game event with its quotes, as delivered by an odds provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub source: String,
    pub external_event_id: String,
    pub league: String,
    pub start_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub odds: Vec<OddsLine>,
}

/// Trait that every odds provider must implement.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Fetch the current batch of upcoming events with their quotes.
    async fn fetch_events_and_odds(&self) -> Result<Vec<EventRecord>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Pick the provider for this deployment: the HTTP feed when configured,
/// otherwise the built-in mock.
pub fn default_provider(config: &Config) -> Result<Arc<dyn OddsProvider>> {
    let provider: Arc<dyn OddsProvider> = match &config.odds_feed_url {
        Some(url) => Arc::new(HttpOddsProvider::new(
            url,
            config.odds_feed_api_key.as_deref(),
        )?),
        None => Arc::new(MockOddsProvider),
    };
    info!("Using odds provider: {}", provider.name());
    Ok(provider)
}
