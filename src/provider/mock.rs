use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::db::models::Side;

use super::{EventRecord, OddsLine, OddsProvider};

fn line(book: &str, side: Side, price: i32, timestamp: chrono::DateTime<Utc>) -> OddsLine {
    OddsLine {
        book: book.to_string(),
        market: "moneyline".to_string(),
        side,
        price,
        timestamp,
    }
}

/// Fixed two-book fixture for local development and the admin sweep
/// endpoint: one Lakers/Warriors event five minutes out.
pub struct MockOddsProvider;

#[async_trait]
impl OddsProvider for MockOddsProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_events_and_odds(&self) -> Result<Vec<EventRecord>> {
        let now = Utc::now();
        let start = now + Duration::minutes(5);
        Ok(vec![EventRecord {
            source: "mock".to_string(),
            external_event_id: "evt-1".to_string(),
            league: "NBA".to_string(),
            start_time: start,
            home_team: "los angeles lakers".to_string(),
            away_team: "golden state warriors".to_string(),
            odds: vec![
                line("book_a", Side::Home, -110, now),
                line("book_a", Side::Away, 100, now),
                line("book_b", Side::Home, -105, now),
                line("book_b", Side::Away, -105, now),
            ],
        }])
    }
}

/// Three-book fixture with slightly aged lines that always clears the
/// default consensus and edge gates; used by tests that need a pick.
pub struct DeterministicMockOddsProvider;

#[async_trait]
impl OddsProvider for DeterministicMockOddsProvider {
    fn name(&self) -> &str {
        "deterministic-mock"
    }

    async fn fetch_events_and_odds(&self) -> Result<Vec<EventRecord>> {
        let now = Utc::now();
        let start = now + Duration::minutes(5);
        let line_ts = now - Duration::seconds(15);
        Ok(vec![EventRecord {
            source: "deterministic-mock".to_string(),
            external_event_id: "evt-deterministic-1".to_string(),
            league: "NBA".to_string(),
            start_time: start,
            home_team: "los angeles lakers".to_string(),
            away_team: "golden state warriors".to_string(),
            odds: vec![
                line("book_a", Side::Home, -110, line_ts),
                line("book_a", Side::Away, 100, line_ts),
                line("book_b", Side::Home, -108, line_ts),
                line("book_b", Side::Away, -102, line_ts),
                line("book_c", Side::Home, -105, line_ts),
                line("book_c", Side::Away, -105, line_ts),
            ],
        }])
    }
}
