use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub mod models;
use models::*;

/// Thread-safe SQLite handle (single connection behind a mutex).
///
/// A pipeline run takes the connection for its whole transaction, which
/// also serializes runs against each other: one run is the atomic unit of
/// scheduling against this store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    /// A `sqlite://` URL prefix is tolerated and stripped.
    pub fn open(path: &str) -> Result<Self> {
        let path = path.trim_start_matches("sqlite://");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Execute `f` inside a single transaction. The transaction commits only
    /// if `f` returns `Ok`; any error rolls the whole batch back, so callers
    /// never observe partial run output.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit().context("failed to commit transaction")?;
        Ok(out)
    }

    // ── Read side (HTTP views) ───────────────────────────────────────────────

    /// Id of the most recent pipeline run, if any.
    pub fn latest_run_id(&self) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM pipeline_runs ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Picks created today (UTC date).
    pub fn list_picks_today(&self) -> Result<Vec<Pick>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, pick_lifecycle_id, odds_snapshot_id, event_normalized_id,
                    feature_snapshot_id, model_version, feature_version, market,
                    side, book, pick_time_price, decimal_odds, implied_prob,
                    market_consensus_prob, model_prob, model_edge, ev_percent,
                    kelly_fraction, tier, created_at, status
             FROM picks WHERE date(created_at) = date('now') ORDER BY id",
        )?;
        let picks = stmt
            .query_map([], map_pick)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(picks)
    }

    pub fn get_pick(&self, id: i64) -> Result<Option<Pick>> {
        let conn = self.conn.lock().unwrap();
        let pick = conn
            .query_row(
                "SELECT id, pick_lifecycle_id, odds_snapshot_id, event_normalized_id,
                        feature_snapshot_id, model_version, feature_version, market,
                        side, book, pick_time_price, decimal_odds, implied_prob,
                        market_consensus_prob, model_prob, model_edge, ev_percent,
                        kelly_fraction, tier, created_at, status
                 FROM picks WHERE id = ?1",
                params![id],
                map_pick,
            )
            .optional()?;
        Ok(pick)
    }

    /// Aggregate closing-line-value metrics over all settlements. Each mean
    /// is taken over the settlements that carry the respective value.
    pub fn clv_metrics(&self) -> Result<ClvMetrics> {
        let conn = self.conn.lock().unwrap();
        let (clv_market, clv_book, count): (Option<f64>, Option<f64>, i64) = conn.query_row(
            "SELECT AVG(clv_market), AVG(clv_book), COUNT(*) FROM settlements",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        Ok(ClvMetrics {
            aggregate_clv_market: clv_market.unwrap_or(0.0),
            aggregate_clv_book: clv_book.unwrap_or(0.0),
            count,
        })
    }
}

/// Aggregate CLV view returned by `GET /metrics/clv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClvMetrics {
    pub aggregate_clv_market: f64,
    pub aggregate_clv_book: f64,
    pub count: i64,
}

// ── Reference data (check-then-insert, unique constraints as the backstop) ───

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn find_league(conn: &Connection, name: &str) -> Result<Option<League>> {
    let league = conn
        .query_row(
            "SELECT id, name FROM leagues WHERE name = ?1",
            params![name],
            |r| {
                Ok(League {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(league)
}

/// Insert a league unless present. A concurrent seeder may win the race;
/// the unique constraint failure is swallowed as benign.
pub fn insert_league_if_missing(conn: &Connection, name: &str) -> Result<()> {
    if find_league(conn, name)?.is_some() {
        return Ok(());
    }
    match conn.execute("INSERT INTO leagues (name) VALUES (?1)", params![name]) {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn find_team(conn: &Connection, normalized_name: &str) -> Result<Option<Team>> {
    let team = conn
        .query_row(
            "SELECT id, normalized_name FROM teams WHERE normalized_name = ?1",
            params![normalized_name],
            |r| {
                Ok(Team {
                    id: r.get(0)?,
                    normalized_name: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(team)
}

pub fn insert_team_if_missing(conn: &Connection, normalized_name: &str) -> Result<()> {
    if find_team(conn, normalized_name)?.is_some() {
        return Ok(());
    }
    match conn.execute(
        "INSERT INTO teams (normalized_name) VALUES (?1)",
        params![normalized_name],
    ) {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// All alias rows exactly matching the (lowercased) string.
pub fn alias_matches(conn: &Connection, alias: &str) -> Result<Vec<TeamAlias>> {
    let mut stmt = conn.prepare(
        "SELECT id, alias, team_id, source, confidence FROM team_aliases WHERE alias = ?1",
    )?;
    let rows = stmt
        .query_map(params![alias], |r| {
            Ok(TeamAlias {
                id: r.get(0)?,
                alias: r.get(1)?,
                team_id: r.get(2)?,
                source: r.get(3)?,
                confidence: r.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_alias_if_missing(
    conn: &Connection,
    alias: &str,
    team_id: i64,
    source: &str,
    confidence: f64,
) -> Result<()> {
    if !alias_matches(conn, alias)?.is_empty() {
        return Ok(());
    }
    match conn.execute(
        "INSERT INTO team_aliases (alias, team_id, source, confidence) VALUES (?1,?2,?3,?4)",
        params![alias, team_id, source, confidence],
    ) {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── Run-scoped writes ────────────────────────────────────────────────────────

pub fn insert_event_raw(conn: &Connection, raw: &EventRaw) -> Result<i64> {
    conn.execute(
        "INSERT INTO events_raw (source, external_event_id, league, start_time, home_team, away_team)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            raw.source,
            raw.external_event_id,
            raw.league,
            raw.start_time,
            raw.home_team,
            raw.away_team,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_event_normalized(conn: &Connection, norm: &EventNormalized) -> Result<i64> {
    conn.execute(
        "INSERT INTO events_normalized (
            event_raw_id, league_id, start_time, home_team_id, away_team_id,
            mapping_confidence, status, quarantine_reason
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            norm.event_raw_id,
            norm.league_id,
            norm.start_time,
            norm.home_team_id,
            norm.away_team_id,
            norm.mapping_confidence,
            norm.status,
            norm.quarantine_reason,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write back normalization/quarantine fields after the normalizer or the
/// consensus gate has updated them.
pub fn update_event_normalized(conn: &Connection, norm: &EventNormalized) -> Result<()> {
    conn.execute(
        "UPDATE events_normalized SET
            home_team_id=?1, away_team_id=?2, mapping_confidence=?3,
            status=?4, quarantine_reason=?5
         WHERE id=?6",
        params![
            norm.home_team_id,
            norm.away_team_id,
            norm.mapping_confidence,
            norm.status,
            norm.quarantine_reason,
            norm.id,
        ],
    )?;
    Ok(())
}

pub fn insert_odds_snapshot(conn: &Connection, snap: &OddsSnapshot) -> Result<i64> {
    conn.execute(
        "INSERT INTO odds_snapshots (
            event_raw_id, event_normalized_id, book, market, side, price, timestamp, is_stale
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            snap.event_raw_id,
            snap.event_normalized_id,
            snap.book,
            snap.market,
            snap.side,
            snap.price,
            snap.timestamp,
            snap.is_stale,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_market_consensus(conn: &Connection, row: &MarketConsensus) -> Result<i64> {
    conn.execute(
        "INSERT INTO market_consensus (event_normalized_id, market, consensus_prob, consensus_price, timestamp)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            row.event_normalized_id,
            row.market,
            row.consensus_prob,
            row.consensus_price,
            row.timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_feature_snapshot(conn: &Connection, snap: &FeatureSnapshot) -> Result<i64> {
    conn.execute(
        "INSERT INTO feature_snapshots (event_normalized_id, feature_version, features_json, computed_at)
         VALUES (?1,?2,?3,?4)",
        params![
            snap.event_normalized_id,
            snap.feature_version,
            serde_json::to_string(&snap.features)?,
            snap.computed_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The newest model artifact by id, if any has been trained.
pub fn latest_model_artifact(conn: &Connection) -> Result<Option<ModelArtifact>> {
    let artifact = conn
        .query_row(
            "SELECT id, model_version, trained_at, training_window, metrics_json, artifact_path
             FROM model_artifacts ORDER BY id DESC LIMIT 1",
            [],
            map_model_artifact,
        )
        .optional()?;
    Ok(artifact)
}

pub fn insert_model_artifact(
    conn: &Connection,
    model_version: &str,
    trained_at: chrono::DateTime<chrono::Utc>,
    training_window: &str,
    metrics: &serde_json::Value,
    artifact_path: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO model_artifacts (model_version, trained_at, training_window, metrics_json, artifact_path)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            model_version,
            trained_at,
            training_window,
            serde_json::to_string(metrics)?,
            artifact_path,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_pick(conn: &Connection, pick: &Pick) -> Result<i64> {
    conn.execute(
        "INSERT INTO picks (
            pick_lifecycle_id, odds_snapshot_id, event_normalized_id, feature_snapshot_id,
            model_version, feature_version, market, side, book, pick_time_price,
            decimal_odds, implied_prob, market_consensus_prob, model_prob, model_edge,
            ev_percent, kelly_fraction, tier, created_at, status
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        params![
            pick.pick_lifecycle_id,
            pick.odds_snapshot_id,
            pick.event_normalized_id,
            pick.feature_snapshot_id,
            pick.model_version,
            pick.feature_version,
            pick.market,
            pick.side,
            pick.book,
            pick.pick_time_price,
            pick.decimal_odds,
            pick.implied_prob,
            pick.market_consensus_prob,
            pick.model_prob,
            pick.model_edge,
            pick.ev_percent,
            pick.kelly_fraction,
            pick.tier,
            pick.created_at,
            pick.status,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn mark_pick_settled(conn: &Connection, pick_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE picks SET status=?1 WHERE id=?2",
        params![PickStatus::Settled, pick_id],
    )?;
    Ok(())
}

pub fn insert_closing_line(conn: &Connection, close: &ClosingLine) -> Result<i64> {
    conn.execute(
        "INSERT INTO closing_lines (
            pick_id, close_price, close_implied_prob, captured_at, market_close_consensus,
            closing_line_snapshot_id, close_book_price, close_book_implied_prob,
            close_market_consensus_prob
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            close.pick_id,
            close.close_price,
            close.close_implied_prob,
            close.captured_at,
            close.market_close_consensus,
            close.closing_line_snapshot_id,
            close.close_book_price,
            close.close_book_implied_prob,
            close.close_market_consensus_prob,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_settlement(conn: &Connection, settlement: &Settlement) -> Result<i64> {
    conn.execute(
        "INSERT INTO settlements (
            pick_id, result, settled_at, pnl, roi, clv_market, clv_book, settlement_source
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            settlement.pick_id,
            settlement.result,
            settlement.settled_at,
            settlement.pnl,
            settlement.roi,
            settlement.clv_market,
            settlement.clv_book,
            settlement.settlement_source,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_pipeline_run(conn: &Connection, run: &PipelineRun) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs (
            started_at, finished_at, latency_seconds, freshness_seconds,
            close_line_coverage, mapping_anomaly_rate, quarantine_count, metadata_json
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            run.started_at,
            run.finished_at,
            run.latency_seconds,
            run.freshness_seconds,
            run.close_line_coverage,
            run.mapping_anomaly_rate,
            run.quarantine_count,
            serde_json::to_string(&run.metadata)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Counts (cumulative telemetry inputs) ─────────────────────────────────────

pub fn count_picks(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM picks", [], |r| r.get(0))?;
    Ok(n)
}

pub fn count_closing_lines(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM closing_lines", [], |r| r.get(0))?;
    Ok(n)
}

pub fn count_events_normalized(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM events_normalized", [], |r| r.get(0))?;
    Ok(n)
}

// ── SQL helpers ──────────────────────────────────────────────────────────────

fn map_pick(row: &rusqlite::Row) -> rusqlite::Result<Pick> {
    Ok(Pick {
        id: row.get(0)?,
        pick_lifecycle_id: row.get(1)?,
        odds_snapshot_id: row.get(2)?,
        event_normalized_id: row.get(3)?,
        feature_snapshot_id: row.get(4)?,
        model_version: row.get(5)?,
        feature_version: row.get(6)?,
        market: row.get(7)?,
        side: row.get(8)?,
        book: row.get(9)?,
        pick_time_price: row.get(10)?,
        decimal_odds: row.get(11)?,
        implied_prob: row.get(12)?,
        market_consensus_prob: row.get(13)?,
        model_prob: row.get(14)?,
        model_edge: row.get(15)?,
        ev_percent: row.get(16)?,
        kelly_fraction: row.get(17)?,
        tier: row.get(18)?,
        created_at: row.get(19)?,
        status: row.get(20)?,
    })
}

fn map_model_artifact(row: &rusqlite::Row) -> rusqlite::Result<ModelArtifact> {
    let metrics_json: String = row.get(4)?;
    Ok(ModelArtifact {
        id: row.get(0)?,
        model_version: row.get(1)?,
        trained_at: row.get(2)?,
        training_window: row.get(3)?,
        metrics: serde_json::from_str(&metrics_json).unwrap_or(serde_json::Value::Null),
        artifact_path: row.get(5)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS leagues (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS teams (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    normalized_name TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS team_aliases (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    alias      TEXT    NOT NULL UNIQUE,
    team_id    INTEGER NOT NULL,
    source     TEXT    NOT NULL DEFAULT 'manual',
    confidence REAL    NOT NULL DEFAULT 1.0,
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS events_raw (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source            TEXT    NOT NULL,
    external_event_id TEXT    NOT NULL,
    league            TEXT    NOT NULL,
    start_time        TEXT    NOT NULL,
    home_team         TEXT    NOT NULL,
    away_team         TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS events_normalized (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    event_raw_id       INTEGER NOT NULL,
    league_id          INTEGER NOT NULL,
    start_time         TEXT    NOT NULL,
    home_team_id       INTEGER,
    away_team_id       INTEGER,
    mapping_confidence REAL    NOT NULL DEFAULT 0.0,
    status             TEXT    NOT NULL DEFAULT 'scheduled',
    quarantine_reason  TEXT,
    FOREIGN KEY (event_raw_id) REFERENCES events_raw(id),
    FOREIGN KEY (league_id)    REFERENCES leagues(id),
    FOREIGN KEY (home_team_id) REFERENCES teams(id),
    FOREIGN KEY (away_team_id) REFERENCES teams(id),
    UNIQUE (league_id, start_time, home_team_id, away_team_id)
);

CREATE TABLE IF NOT EXISTS odds_snapshots (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    event_raw_id        INTEGER NOT NULL,
    event_normalized_id INTEGER,
    book                TEXT    NOT NULL,
    market              TEXT    NOT NULL DEFAULT 'moneyline',
    side                TEXT    NOT NULL,
    price               INTEGER NOT NULL,
    timestamp           TEXT    NOT NULL,
    is_stale            INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (event_raw_id)        REFERENCES events_raw(id),
    FOREIGN KEY (event_normalized_id) REFERENCES events_normalized(id)
);

CREATE TABLE IF NOT EXISTS market_consensus (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    event_normalized_id INTEGER NOT NULL,
    market              TEXT    NOT NULL DEFAULT 'moneyline',
    consensus_prob      REAL    NOT NULL,
    consensus_price     REAL    NOT NULL,
    timestamp           TEXT    NOT NULL,
    FOREIGN KEY (event_normalized_id) REFERENCES events_normalized(id)
);

CREATE TABLE IF NOT EXISTS feature_snapshots (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    event_normalized_id INTEGER NOT NULL,
    feature_version     TEXT    NOT NULL,
    features_json       TEXT    NOT NULL,
    computed_at         TEXT    NOT NULL,
    FOREIGN KEY (event_normalized_id) REFERENCES events_normalized(id)
);

CREATE TABLE IF NOT EXISTS model_artifacts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    model_version   TEXT    NOT NULL UNIQUE,
    trained_at      TEXT    NOT NULL,
    training_window TEXT    NOT NULL,
    metrics_json    TEXT    NOT NULL,
    artifact_path   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS picks (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    pick_lifecycle_id     TEXT    NOT NULL,
    odds_snapshot_id      INTEGER NOT NULL,
    event_normalized_id   INTEGER NOT NULL,
    feature_snapshot_id   INTEGER NOT NULL,
    model_version         TEXT    NOT NULL,
    feature_version       TEXT    NOT NULL,
    market                TEXT    NOT NULL,
    side                  TEXT    NOT NULL,
    book                  TEXT    NOT NULL,
    pick_time_price       INTEGER NOT NULL,
    decimal_odds          REAL    NOT NULL,
    implied_prob          REAL    NOT NULL,
    market_consensus_prob REAL    NOT NULL,
    model_prob            REAL    NOT NULL,
    model_edge            REAL    NOT NULL,
    ev_percent            REAL    NOT NULL,
    kelly_fraction        REAL    NOT NULL,
    tier                  TEXT    NOT NULL,
    created_at            TEXT    NOT NULL,
    status                TEXT    NOT NULL DEFAULT 'open',
    FOREIGN KEY (odds_snapshot_id)    REFERENCES odds_snapshots(id),
    FOREIGN KEY (event_normalized_id) REFERENCES events_normalized(id),
    FOREIGN KEY (feature_snapshot_id) REFERENCES feature_snapshots(id)
);

CREATE TABLE IF NOT EXISTS closing_lines (
    id                          INTEGER PRIMARY KEY AUTOINCREMENT,
    pick_id                     INTEGER NOT NULL UNIQUE,
    close_price                 INTEGER NOT NULL,
    close_implied_prob          REAL    NOT NULL,
    captured_at                 TEXT    NOT NULL,
    market_close_consensus      REAL,
    closing_line_snapshot_id    INTEGER,
    close_book_price            INTEGER,
    close_book_implied_prob     REAL,
    close_market_consensus_prob REAL,
    FOREIGN KEY (pick_id)                  REFERENCES picks(id),
    FOREIGN KEY (closing_line_snapshot_id) REFERENCES odds_snapshots(id)
);

CREATE TABLE IF NOT EXISTS settlements (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    pick_id           INTEGER NOT NULL UNIQUE,
    result            TEXT    NOT NULL,
    settled_at        TEXT    NOT NULL,
    pnl               REAL    NOT NULL,
    roi               REAL    NOT NULL,
    clv_market        REAL,
    clv_book          REAL,
    settlement_source TEXT    NOT NULL DEFAULT 'simulated',
    FOREIGN KEY (pick_id) REFERENCES picks(id)
);

CREATE TABLE IF NOT EXISTS pipeline_runs (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at           TEXT    NOT NULL,
    finished_at          TEXT    NOT NULL,
    latency_seconds      REAL    NOT NULL,
    freshness_seconds    REAL    NOT NULL,
    close_line_coverage  REAL    NOT NULL,
    mapping_anomaly_rate REAL    NOT NULL,
    quarantine_count     INTEGER NOT NULL,
    metadata_json        TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_picks_lifecycle ON picks(pick_lifecycle_id);
CREATE INDEX IF NOT EXISTS idx_picks_status ON picks(status);
CREATE INDEX IF NOT EXISTS idx_odds_snapshots_event ON odds_snapshots(event_raw_id);
CREATE INDEX IF NOT EXISTS idx_events_normalized_status ON events_normalized(status);
"#;
