//! The per-run pipeline sweep.
//!
//! One run is one transaction: raw events, normalized events, odds
//! snapshots, consensus, features, picks, closing lines, settlements and
//! the telemetry row either all commit together or none do. The provider
//! fetch is the only awaited external call; everything downstream is
//! ordered synchronous work per event.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{self, models::*, Database};
use crate::model::predict_home_win_probability;
use crate::provider::{EventRecord, OddsProvider};

use super::consensus::{build_market_consensus, ConsensusOptions, QuoteLine};
use super::features::{build_pregame_features, FEATURE_VERSION};
use super::normalize::normalize_event;
use super::odds::{american_to_decimal, american_to_implied_prob, ev_percent, quarter_kelly};

/// Model probability used when no trained artifact exists yet.
const DEFAULT_MODEL_PROB: f64 = 0.56;

/// Outcome of one pipeline sweep, returned to the caller and the admin
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub quarantine_count: u32,
    /// Cumulative pick count across all runs.
    pub total_picks: i64,
    pub events_processed: u32,
    pub picks_emitted_this_run: u32,
    pub block_reasons: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_picks_reason: Option<String>,
}

/// Tier boundaries over the model edge.
pub fn confidence_tier(edge: f64) -> PickTier {
    if edge >= 0.07 {
        PickTier::A
    } else if edge >= 0.05 {
        PickTier::B
    } else {
        PickTier::C
    }
}

/// Orchestrates pipeline sweeps against one database.
pub struct PipelineEngine {
    config: Config,
    db: Database,
}

impl PipelineEngine {
    pub fn new(config: Config, db: Database) -> Self {
        PipelineEngine { config, db }
    }

    /// Execute one batch sweep against the given provider.
    pub async fn run_once(&self, provider: &dyn OddsProvider) -> Result<RunSummary> {
        let started = Utc::now();
        self.db.with_transaction(seed_reference_data)?;

        let payload = provider
            .fetch_events_and_odds()
            .await
            .with_context(|| format!("provider '{}' fetch failed", provider.name()))?;
        info!(
            "Provider '{}' returned {} event(s)",
            provider.name(),
            payload.len()
        );

        self.db
            .with_transaction(|conn| self.process_payload(conn, &payload, started))
    }

    fn process_payload(
        &self,
        conn: &Connection,
        payload: &[EventRecord],
        started: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let stale_max_age = self.config.stale_max_age_seconds() as i64;
        let mut latencies: Vec<f64> = Vec::new();
        let mut quarantine_count: u32 = 0;
        let mut events_processed: u32 = 0;
        let mut picks_emitted: u32 = 0;
        let mut block_reasons: BTreeMap<String, u32> = BTreeMap::new();

        for event in payload {
            events_processed += 1;
            let raw_id = db::insert_event_raw(
                conn,
                &EventRaw {
                    id: None,
                    source: event.source.clone(),
                    external_event_id: event.external_event_id.clone(),
                    league: event.league.clone(),
                    start_time: event.start_time,
                    home_team: event.home_team.clone(),
                    away_team: event.away_team.clone(),
                },
            )?;

            let league = db::find_league(conn, &event.league)?
                .with_context(|| format!("unknown league '{}' in provider payload", event.league))?;
            let mut norm = EventNormalized {
                id: None,
                event_raw_id: raw_id,
                league_id: league.id,
                start_time: event.start_time,
                home_team_id: None,
                away_team_id: None,
                mapping_confidence: 0.0,
                status: EventStatus::Scheduled,
                quarantine_reason: None,
            };
            norm.id = Some(db::insert_event_normalized(conn, &norm)?);
            normalize_event(
                conn,
                &mut norm,
                &event.home_team,
                &event.away_team,
                Utc::now(),
                self.config.mapping_time_tolerance_minutes,
                self.config.mapping_confidence_threshold,
            )?;
            db::update_event_normalized(conn, &norm)?;
            if norm.status == EventStatus::Quarantined {
                quarantine_count += 1;
            }
            let norm_id = norm.id.unwrap_or_default();
            info!(
                "Event normalized: raw_id={} norm_id={} confidence={:.2} reason={:?}",
                raw_id, norm_id, norm.mapping_confidence, norm.quarantine_reason
            );

            let mut valid_lines: Vec<QuoteLine> = Vec::new();
            for line in &event.odds {
                let age_seconds = (Utc::now() - line.timestamp).num_seconds();
                let stale = age_seconds > stale_max_age;
                let snapshot_id = db::insert_odds_snapshot(
                    conn,
                    &OddsSnapshot {
                        id: None,
                        event_raw_id: raw_id,
                        event_normalized_id: Some(norm_id),
                        book: line.book.clone(),
                        market: line.market.clone(),
                        side: line.side,
                        price: line.price,
                        timestamp: line.timestamp,
                        is_stale: stale,
                    },
                )?;
                if !stale {
                    valid_lines.push(QuoteLine {
                        book: line.book.clone(),
                        market: line.market.clone(),
                        side: line.side,
                        price: line.price,
                        timestamp: line.timestamp,
                        is_stale: stale,
                        snapshot_id,
                    });
                }
            }

            if norm.mapping_confidence < self.config.mapping_confidence_threshold {
                *block_reasons
                    .entry("LOW_MAPPING_CONFIDENCE".to_string())
                    .or_insert(0) += 1;
                continue;
            }
            if valid_lines.is_empty() {
                *block_reasons.entry("NO_FRESH_ODDS".to_string()).or_insert(0) += 1;
                continue;
            }

            let consensus_opts = ConsensusOptions {
                min_books: self.config.consensus_min_books,
                trim_outliers: self.config.consensus_trim_outliers,
                book_weights: None,
            };
            let decision = build_market_consensus(&valid_lines, &consensus_opts);
            let books_count = {
                let mut books: Vec<&str> = valid_lines.iter().map(|l| l.book.as_str()).collect();
                books.sort_unstable();
                books.dedup();
                books.len()
            };
            info!(
                "Consensus gate: norm_id={} books={} stale_dropped={} missing_reason={:?}",
                norm_id,
                books_count,
                event.odds.len() - valid_lines.len(),
                decision.missing_reason
            );
            let Some(consensus) = decision.result else {
                let reason = decision.missing_reason.unwrap_or("CONSENSUS_UNAVAILABLE");
                norm.status = EventStatus::Quarantined;
                norm.quarantine_reason = Some(reason.to_string());
                db::update_event_normalized(conn, &norm)?;
                quarantine_count += 1;
                *block_reasons.entry(reason.to_string()).or_insert(0) += 1;
                continue;
            };

            db::insert_market_consensus(
                conn,
                &MarketConsensus {
                    id: None,
                    event_normalized_id: norm_id,
                    market: "moneyline".to_string(),
                    consensus_prob: consensus.home_prob,
                    consensus_price: 1.0 / consensus.home_prob,
                    timestamp: Utc::now(),
                },
            )?;

            let features = build_pregame_features(norm_id, Utc::now());
            let feature_snapshot_id = db::insert_feature_snapshot(
                conn,
                &FeatureSnapshot {
                    id: None,
                    event_normalized_id: norm_id,
                    feature_version: FEATURE_VERSION.to_string(),
                    features: serde_json::to_value(&features)?,
                    computed_at: Utc::now(),
                },
            )?;

            let artifact = db::latest_model_artifact(conn)?;
            let (model_prob, model_version) = match &artifact {
                Some(artifact) => (
                    predict_home_win_probability(&features.row, &artifact.artifact_path)?,
                    artifact.model_version.clone(),
                ),
                None => (DEFAULT_MODEL_PROB, "baseline-default".to_string()),
            };

            let model_edge = model_prob - consensus.home_prob;
            info!(
                "Edge gate: norm_id={} model_prob={:.3} market_prob={:.3} edge={:.3} threshold={:.3}",
                norm_id, model_prob, consensus.home_prob, model_edge, self.config.edge_threshold
            );
            if model_edge > self.config.edge_threshold {
                let Some(best_home) = valid_lines.iter().find(|l| l.side == Side::Home) else {
                    *block_reasons
                        .entry("NO_HOME_SIDE_LINE".to_string())
                        .or_insert(0) += 1;
                    info!("Pick blocked: norm_id={} reason=NO_HOME_SIDE_LINE", norm_id);
                    continue;
                };
                let dec = american_to_decimal(best_home.price);
                let pick = Pick {
                    id: None,
                    pick_lifecycle_id: Uuid::new_v4().to_string(),
                    odds_snapshot_id: best_home.snapshot_id,
                    event_normalized_id: norm_id,
                    feature_snapshot_id,
                    model_version,
                    feature_version: FEATURE_VERSION.to_string(),
                    market: "moneyline".to_string(),
                    side: Side::Home,
                    book: best_home.book.clone(),
                    pick_time_price: best_home.price,
                    decimal_odds: dec,
                    implied_prob: american_to_implied_prob(best_home.price),
                    market_consensus_prob: consensus.home_prob,
                    model_prob,
                    model_edge,
                    ev_percent: ev_percent(model_prob, dec),
                    kelly_fraction: quarter_kelly(model_prob, dec),
                    tier: confidence_tier(model_edge),
                    created_at: Utc::now(),
                    status: PickStatus::Open,
                };
                let pick_id = db::insert_pick(conn, &pick)?;
                picks_emitted += 1;
                info!(
                    "Pick emitted: norm_id={} pick_id={} lifecycle_id={}",
                    norm_id, pick_id, pick.pick_lifecycle_id
                );

                self.capture_close_and_settle(
                    conn,
                    &valid_lines,
                    &pick,
                    pick_id,
                    event.start_time,
                    &consensus_opts,
                )?;
            } else {
                *block_reasons
                    .entry("EDGE_BELOW_THRESHOLD".to_string())
                    .or_insert(0) += 1;
                info!(
                    "Pick blocked: norm_id={} reason=EDGE_BELOW_THRESHOLD",
                    norm_id
                );
            }

            latencies.push((Utc::now() - started).num_milliseconds() as f64 / 1000.0);
        }

        let total_picks = db::count_picks(conn)?;
        let close_lines = db::count_closing_lines(conn)?;
        let close_coverage = if total_picks > 0 {
            close_lines as f64 / total_picks as f64
        } else {
            0.0
        };
        let total_normalized = db::count_events_normalized(conn)?.max(1);

        let mut sorted = latencies.clone();
        sorted.sort_by(f64::total_cmp);
        db::insert_pipeline_run(
            conn,
            &PipelineRun {
                id: None,
                started_at: started,
                finished_at: Utc::now(),
                latency_seconds: sorted.last().copied().unwrap_or(0.0),
                freshness_seconds: 0.0,
                close_line_coverage: close_coverage,
                mapping_anomaly_rate: quarantine_count as f64 / total_normalized as f64,
                quarantine_count: quarantine_count as i64,
                metadata: RunMetadata {
                    p50_latency: median(&sorted),
                    p95_latency: p95(&sorted),
                    events_processed,
                    picks_emitted,
                    block_reasons: block_reasons.clone(),
                },
            },
        )?;

        let no_picks_reason = if picks_emitted == 0 {
            Some(
                block_reasons
                    .iter()
                    .max_by_key(|(_, &count)| count)
                    .map(|(reason, _)| reason.clone())
                    .unwrap_or_else(|| "NO_ELIGIBLE_EVENTS".to_string()),
            )
        } else {
            None
        };

        Ok(RunSummary {
            quarantine_count,
            total_picks,
            events_processed,
            picks_emitted_this_run: picks_emitted,
            block_reasons,
            no_picks_reason,
        })
    }

    /// Deterministic closing-line selection and simulated settlement.
    ///
    /// The closing snapshot is the latest quote from the pick's own book
    /// and side whose timestamp falls inside the close-capture window; the
    /// closing consensus runs over every in-window line. Without a closing
    /// snapshot neither a closing line nor a settlement is written.
    fn capture_close_and_settle(
        &self,
        conn: &Connection,
        valid_lines: &[QuoteLine],
        pick: &Pick,
        pick_id: i64,
        start_time: DateTime<Utc>,
        consensus_opts: &ConsensusOptions,
    ) -> Result<()> {
        let window_start =
            start_time - Duration::minutes(self.config.close_capture_window_minutes);
        let close_snapshot = valid_lines
            .iter()
            .filter(|l| {
                l.book == pick.book
                    && l.side == pick.side
                    && l.timestamp >= window_start
                    && l.timestamp <= start_time
            })
            .max_by_key(|l| l.timestamp);

        let close_window_lines: Vec<QuoteLine> = valid_lines
            .iter()
            .filter(|l| l.timestamp >= window_start && l.timestamp <= start_time)
            .cloned()
            .collect();
        let close_market_consensus_prob = build_market_consensus(&close_window_lines, consensus_opts)
            .result
            .map(|r| r.home_prob);

        let Some(close_snapshot) = close_snapshot else {
            info!(
                "No closing snapshot inside capture window for pick_id={}",
                pick_id
            );
            return Ok(());
        };

        let close_book_implied_prob = american_to_implied_prob(close_snapshot.price);
        db::insert_closing_line(
            conn,
            &ClosingLine {
                id: None,
                pick_id,
                close_price: close_snapshot.price,
                close_implied_prob: close_book_implied_prob,
                captured_at: close_snapshot.timestamp,
                market_close_consensus: close_market_consensus_prob,
                closing_line_snapshot_id: Some(close_snapshot.snapshot_id),
                close_book_price: Some(close_snapshot.price),
                close_book_implied_prob: Some(close_book_implied_prob),
                close_market_consensus_prob,
            },
        )?;

        let clv_book = close_book_implied_prob - pick.implied_prob;
        let clv_market = close_market_consensus_prob.map(|p| p - pick.implied_prob);
        db::insert_settlement(
            conn,
            &Settlement {
                id: None,
                pick_id,
                result: BetResult::W,
                settled_at: Utc::now(),
                pnl: pick.decimal_odds - 1.0,
                roi: ev_percent(pick.model_prob, pick.decimal_odds),
                clv_market,
                clv_book: Some(clv_book),
                settlement_source: "simulated".to_string(),
            },
        )?;
        db::mark_pick_settled(conn, pick_id)?;
        Ok(())
    }
}

/// Idempotently seed the reference league, teams and aliases. Safe against
/// concurrent seeders: the unique constraints are the arbiter and benign
/// duplicate failures are swallowed.
pub fn seed_reference_data(conn: &Connection) -> Result<()> {
    db::insert_league_if_missing(conn, "NBA")?;
    for name in ["los angeles lakers", "golden state warriors"] {
        db::insert_team_if_missing(conn, name)?;
    }
    let lakers = db::find_team(conn, "los angeles lakers")?
        .context("seeded team 'los angeles lakers' missing")?;
    let warriors = db::find_team(conn, "golden state warriors")?
        .context("seeded team 'golden state warriors' missing")?;
    db::insert_alias_if_missing(conn, "la lakers", lakers.id, "seed", 0.98)?;
    db::insert_alias_if_missing(conn, "gs warriors", warriors.id, "seed", 0.98)?;
    Ok(())
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Index-based p95 over an ascending sample; small samples fall back to
/// the largest value.
fn p95(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * 0.95) as isize - 1;
    if idx < 0 {
        sorted[sorted.len() - 1]
    } else {
        sorted[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Side;
    use crate::provider::mock::{DeterministicMockOddsProvider, MockOddsProvider};
    use crate::provider::OddsLine;
    use async_trait::async_trait;
    use clap::Parser;

    struct FixtureProvider(Vec<EventRecord>);

    #[async_trait]
    impl OddsProvider for FixtureProvider {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn fetch_events_and_odds(&self) -> Result<Vec<EventRecord>> {
            Ok(self.0.clone())
        }
    }

    fn test_config() -> Config {
        Config::parse_from(["valuepicks-bot"])
    }

    fn test_db() -> Database {
        Database::open(":memory:").unwrap()
    }

    fn quote(book: &str, side: Side, price: i32, timestamp: DateTime<Utc>) -> OddsLine {
        OddsLine {
            book: book.to_string(),
            market: "moneyline".to_string(),
            side,
            price,
            timestamp,
        }
    }

    fn nba_event(
        home: &str,
        away: &str,
        start_time: DateTime<Utc>,
        odds: Vec<OddsLine>,
    ) -> EventRecord {
        EventRecord {
            source: "fixture".to_string(),
            external_event_id: "evt-t1".to_string(),
            league: "NBA".to_string(),
            start_time,
            home_team: home.to_string(),
            away_team: away.to_string(),
            odds,
        }
    }

    fn scalar(db: &Database, sql: &str) -> i64 {
        db.with_transaction(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
            .unwrap()
    }

    fn scalar_f64(db: &Database, sql: &str) -> f64 {
        db.with_transaction(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(confidence_tier(0.08), PickTier::A);
        assert_eq!(confidence_tier(0.07), PickTier::A);
        assert_eq!(confidence_tier(0.069), PickTier::B);
        assert_eq!(confidence_tier(0.05), PickTier::B);
        assert_eq!(confidence_tier(0.049), PickTier::C);
        assert_eq!(confidence_tier(0.031), PickTier::C);
    }

    #[tokio::test]
    async fn test_happy_path_emits_full_lifecycle() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());

        let summary = engine.run_once(&MockOddsProvider).await.unwrap();

        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.picks_emitted_this_run, 1);
        assert_eq!(summary.quarantine_count, 0);
        assert_eq!(summary.no_picks_reason, None);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM picks"), 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM market_consensus"), 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM closing_lines"), 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM settlements"), 1);

        let consensus_prob = scalar_f64(&db, "SELECT consensus_prob FROM market_consensus");
        assert!(consensus_prob > 0.49 && consensus_prob < 0.53);

        let pick = db.get_pick(1).unwrap().unwrap();
        assert_eq!(pick.side, Side::Home);
        assert!(pick.model_edge > 0.03);
        assert_eq!(pick.tier, confidence_tier(pick.model_edge));
        assert_eq!(pick.status, PickStatus::Settled);
        // Stored implied probability matches the stored price exactly.
        assert_eq!(pick.implied_prob, american_to_implied_prob(pick.pick_time_price));

        let coverage = scalar_f64(
            &db,
            "SELECT close_line_coverage FROM pipeline_runs ORDER BY id DESC LIMIT 1",
        );
        assert_eq!(coverage, 1.0);
        // No orphan settlements.
        assert_eq!(
            scalar(
                &db,
                "SELECT COUNT(*) FROM settlements WHERE pick_id NOT IN (SELECT pick_id FROM closing_lines)",
            ),
            0
        );
    }

    #[tokio::test]
    async fn test_lifecycle_linkage() {
        let db = test_db();
        let engine = PipelineEngine::new(test_config(), db.clone());
        engine
            .run_once(&DeterministicMockOddsProvider)
            .await
            .unwrap();

        let pick = db.get_pick(1).unwrap().expect("a pick should exist");
        assert_eq!(pick.pick_lifecycle_id.len(), 36);
        assert!(pick.odds_snapshot_id > 0);
        assert!(pick.feature_snapshot_id > 0);
        assert!(pick.event_normalized_id > 0);
        assert_eq!(pick.model_version, "baseline-default");
        assert_eq!(pick.feature_version, "v1");
        assert_eq!(pick.book, "book_a");
    }

    #[tokio::test]
    async fn test_unknown_team_quarantine() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());
        let now = Utc::now();
        let provider = FixtureProvider(vec![nba_event(
            "unknown",
            "unknown2",
            now + Duration::minutes(5),
            vec![
                quote("book_a", Side::Home, -110, now),
                quote("book_a", Side::Away, 100, now),
                quote("book_b", Side::Home, -105, now),
                quote("book_b", Side::Away, -105, now),
            ],
        )]);

        let summary = engine.run_once(&provider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 0);
        assert_eq!(summary.quarantine_count, 1);
        assert_eq!(summary.block_reasons.get("LOW_MAPPING_CONFIDENCE"), Some(&1));
        assert_eq!(
            summary.no_picks_reason.as_deref(),
            Some("LOW_MAPPING_CONFIDENCE")
        );
        let reason: String = db
            .with_transaction(|conn| {
                Ok(conn.query_row(
                    "SELECT quarantine_reason FROM events_normalized",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(reason, "NO_ALIAS_MATCH");
        // Snapshots are persisted even for quarantined events.
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM odds_snapshots"), 4);
    }

    #[tokio::test]
    async fn test_stale_odds_block_pick() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());
        let now = Utc::now();
        let old = now - Duration::minutes(10);
        let provider = FixtureProvider(vec![nba_event(
            "la lakers",
            "gs warriors",
            now + Duration::minutes(5),
            vec![
                quote("book_a", Side::Home, -110, old),
                quote("book_a", Side::Away, 100, old),
                quote("book_b", Side::Home, -105, old),
                quote("book_b", Side::Away, -105, old),
            ],
        )]);

        let summary = engine.run_once(&provider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 0);
        assert_eq!(summary.block_reasons.get("NO_FRESH_ODDS"), Some(&1));
        assert_eq!(
            scalar(&db, "SELECT COUNT(*) FROM odds_snapshots WHERE is_stale = 0"),
            0
        );
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM odds_snapshots"), 4);
    }

    #[tokio::test]
    async fn test_insufficient_books_quarantines_event() {
        let db = test_db();
        // Default consensus_min_books = 3, one book quoted.
        let engine = PipelineEngine::new(test_config(), db.clone());
        let now = Utc::now();
        let provider = FixtureProvider(vec![nba_event(
            "la lakers",
            "gs warriors",
            now + Duration::minutes(5),
            vec![
                quote("book_a", Side::Home, -110, now),
                quote("book_a", Side::Away, 100, now),
            ],
        )]);

        let summary = engine.run_once(&provider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 0);
        assert_eq!(summary.quarantine_count, 1);
        assert_eq!(summary.block_reasons.get("INSUFFICIENT_BOOKS"), Some(&1));
        let (status, reason): (String, String) = db
            .with_transaction(|conn| {
                Ok(conn.query_row(
                    "SELECT status, quarantine_reason FROM events_normalized",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!(status, "quarantined");
        assert_eq!(reason, "INSUFFICIENT_BOOKS");
    }

    #[tokio::test]
    async fn test_edge_below_threshold() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());
        let now = Utc::now();
        // Heavy home favorite: consensus far above the default model
        // probability, so no edge.
        let provider = FixtureProvider(vec![nba_event(
            "la lakers",
            "gs warriors",
            now + Duration::minutes(5),
            vec![
                quote("book_a", Side::Home, -400, now),
                quote("book_a", Side::Away, 300, now),
                quote("book_b", Side::Home, -380, now),
                quote("book_b", Side::Away, 290, now),
            ],
        )]);

        let summary = engine.run_once(&provider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 0);
        assert_eq!(summary.quarantine_count, 0);
        assert_eq!(summary.block_reasons.get("EDGE_BELOW_THRESHOLD"), Some(&1));
        assert_eq!(
            summary.no_picks_reason.as_deref(),
            Some("EDGE_BELOW_THRESHOLD")
        );
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM picks"), 0);
        // Consensus still persisted: the event passed that gate.
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM market_consensus"), 1);
    }

    #[tokio::test]
    async fn test_closing_window_exclusion() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        // Start is 20 minutes out; widen the mapping tolerance so only the
        // closing window excludes the quotes.
        config.mapping_time_tolerance_minutes = 30;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());
        let now = Utc::now();
        let provider = FixtureProvider(vec![nba_event(
            "la lakers",
            "gs warriors",
            now + Duration::minutes(20),
            vec![
                quote("book_a", Side::Home, -110, now),
                quote("book_a", Side::Away, 100, now),
                quote("book_b", Side::Home, -105, now),
                quote("book_b", Side::Away, -105, now),
            ],
        )]);

        let summary = engine.run_once(&provider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM closing_lines"), 0);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM settlements"), 0);
        let coverage = scalar_f64(
            &db,
            "SELECT close_line_coverage FROM pipeline_runs ORDER BY id DESC LIMIT 1",
        );
        assert!(coverage < 1.0);
        // Without a settlement the pick stays open.
        let pick = db.get_pick(1).unwrap().unwrap();
        assert_eq!(pick.status, PickStatus::Open);
    }

    #[tokio::test]
    async fn test_no_events_reports_reason() {
        let db = test_db();
        let engine = PipelineEngine::new(test_config(), db.clone());
        let summary = engine.run_once(&FixtureProvider(vec![])).await.unwrap();
        assert_eq!(summary.events_processed, 0);
        assert_eq!(summary.no_picks_reason.as_deref(), Some("NO_ELIGIBLE_EVENTS"));
        // The telemetry row is still written.
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM pipeline_runs"), 1);
    }

    #[tokio::test]
    async fn test_run_scores_with_latest_artifact() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();

        // Handcrafted artifact: zero weights, bias = logit(0.6), so the
        // scorer returns 0.6 for any feature row.
        let dir = tempfile::tempdir().unwrap();
        let artifact_path = dir.path().join("model-fixed.json");
        let model = crate::model::LogisticModel {
            model_version: "model-fixed".to_string(),
            feature_columns: crate::model::FEATURE_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            weights: vec![0.0; 6],
            bias: (0.6f64 / 0.4f64).ln(),
        };
        std::fs::write(&artifact_path, serde_json::to_string(&model).unwrap()).unwrap();
        db.with_transaction(|conn| {
            db::insert_model_artifact(
                conn,
                "model-fixed",
                Utc::now(),
                "seed",
                &serde_json::json!({}),
                artifact_path.to_str().unwrap(),
            )
        })
        .unwrap();

        let engine = PipelineEngine::new(config, db.clone());
        let summary = engine.run_once(&MockOddsProvider).await.unwrap();

        assert_eq!(summary.picks_emitted_this_run, 1);
        let pick = db.get_pick(1).unwrap().unwrap();
        assert_eq!(pick.model_version, "model-fixed");
        assert!((pick.model_prob - 0.6).abs() < 1e-9);
        assert_eq!(pick.tier, PickTier::A);
    }

    #[tokio::test]
    async fn test_total_picks_accumulates_across_runs() {
        let mut config = test_config();
        config.consensus_min_books = 2;
        let db = test_db();
        let engine = PipelineEngine::new(config, db.clone());
        let first = engine.run_once(&MockOddsProvider).await.unwrap();
        let second = engine.run_once(&MockOddsProvider).await.unwrap();
        assert_eq!(first.total_picks, 1);
        assert_eq!(second.total_picks, 2);
        assert_eq!(second.picks_emitted_this_run, 1);
    }
}
