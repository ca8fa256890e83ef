use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Lifecycle state of a normalized event.
///
/// `scheduled → quarantined` on mapping or consensus failure;
/// `scheduled → settled` once every linked pick is settled. `quarantined`
/// is terminal for the run that set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Quarantined,
    Settled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Quarantined => "quarantined",
            EventStatus::Settled => "settled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "quarantined" => Ok(EventStatus::Quarantined),
            "settled" => Ok(EventStatus::Settled),
            other => Err(format!("unknown event status '{other}'")),
        }
    }
}

/// Pick lifecycle: `open` until a settlement row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    Open,
    Settled,
}

impl PickStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickStatus::Open => "open",
            PickStatus::Settled => "settled",
        }
    }
}

impl FromStr for PickStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PickStatus::Open),
            "settled" => Ok(PickStatus::Settled),
            other => Err(format!("unknown pick status '{other}'")),
        }
    }
}

/// Which side of a two-way market a quote or pick refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// Confidence tier derived from the model edge at pick time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickTier {
    A,
    B,
    C,
}

impl PickTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickTier::A => "A",
            PickTier::B => "B",
            PickTier::C => "C",
        }
    }
}

impl FromStr for PickTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(PickTier::A),
            "B" => Ok(PickTier::B),
            "C" => Ok(PickTier::C),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Settlement outcome: win, loss, push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetResult {
    W,
    L,
    P,
}

impl BetResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetResult::W => "W",
            BetResult::L => "L",
            BetResult::P => "P",
        }
    }
}

impl FromStr for BetResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "W" => Ok(BetResult::W),
            "L" => Ok(BetResult::L),
            "P" => Ok(BetResult::P),
            other => Err(format!("unknown result '{other}'")),
        }
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

sql_text_enum!(EventStatus);
sql_text_enum!(PickStatus);
sql_text_enum!(Side);
sql_text_enum!(PickTier);
sql_text_enum!(BetResult);

/// A league known to the reference data. Never mutated after seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
}

/// A canonical team. `normalized_name` is the lowercase canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub normalized_name: String,
}

/// Maps a raw provider team string (lowercased) to a canonical team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAlias {
    pub id: i64,
    pub alias: String,
    pub team_id: i64,
    pub source: String,
    pub confidence: f64,
}

/// Immutable snapshot of a provider event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRaw {
    pub id: Option<i64>,
    pub source: String,
    pub external_event_id: String,
    pub league: String,
    pub start_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
}

/// The normalized view of a raw event after team/time reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventNormalized {
    pub id: Option<i64>,
    pub event_raw_id: i64,
    pub league_id: i64,
    pub start_time: DateTime<Utc>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub mapping_confidence: f64,
    pub status: EventStatus,
    pub quarantine_reason: Option<String>,
}

/// One bookmaker quote at a point in time. Immutable once written;
/// `is_stale` is derived at write time from the configured max age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub id: Option<i64>,
    pub event_raw_id: i64,
    pub event_normalized_id: Option<i64>,
    pub book: String,
    pub market: String,
    pub side: Side,
    /// American price (e.g. -110, +145)
    pub price: i32,
    pub timestamp: DateTime<Utc>,
    pub is_stale: bool,
}

/// The de-vigged home probability at the time the event passed the
/// consensus gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConsensus {
    pub id: Option<i64>,
    pub event_normalized_id: i64,
    pub market: String,
    pub consensus_prob: f64,
    pub consensus_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Feature record persisted for a normalized event; the payload is a typed
/// record in the engine and an opaque JSON blob at this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: Option<i64>,
    pub event_normalized_id: i64,
    pub feature_version: String,
    pub features: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}

/// A trained model artifact reference. The serialized model itself lives
/// on the filesystem at `artifact_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: i64,
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    pub training_window: String,
    pub metrics: serde_json::Value,
    pub artifact_path: String,
}

/// An emitted value pick. Immutable except `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: Option<i64>,
    /// Opaque 36-char identifier tying the pick to its close/settlement rows.
    pub pick_lifecycle_id: String,
    pub odds_snapshot_id: i64,
    pub event_normalized_id: i64,
    pub feature_snapshot_id: i64,
    pub model_version: String,
    pub feature_version: String,
    pub market: String,
    pub side: Side,
    pub book: String,
    pub pick_time_price: i32,
    pub decimal_odds: f64,
    pub implied_prob: f64,
    pub market_consensus_prob: f64,
    pub model_prob: f64,
    pub model_edge: f64,
    pub ev_percent: f64,
    pub kelly_fraction: f64,
    pub tier: PickTier,
    pub created_at: DateTime<Utc>,
    pub status: PickStatus,
}

/// Closing line captured for a pick inside the close-capture window.
/// At most one per pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingLine {
    pub id: Option<i64>,
    pub pick_id: i64,
    pub close_price: i32,
    pub close_implied_prob: f64,
    pub captured_at: DateTime<Utc>,
    pub market_close_consensus: Option<f64>,
    pub closing_line_snapshot_id: Option<i64>,
    pub close_book_price: Option<i32>,
    pub close_book_implied_prob: Option<f64>,
    pub close_market_consensus_prob: Option<f64>,
}

/// Settlement outcome for a pick. At most one per pick, and never written
/// without a closing line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Option<i64>,
    pub pick_id: i64,
    pub result: BetResult,
    pub settled_at: DateTime<Utc>,
    pub pnl: f64,
    pub roi: f64,
    pub clv_market: Option<f64>,
    pub clv_book: Option<f64>,
    pub settlement_source: String,
}

/// Per-run telemetry record, written last before commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_seconds: f64,
    pub freshness_seconds: f64,
    pub close_line_coverage: f64,
    pub mapping_anomaly_rate: f64,
    pub quarantine_count: i64,
    pub metadata: RunMetadata,
}

/// Structured metadata stored on a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub p50_latency: f64,
    pub p95_latency: f64,
    pub events_processed: u32,
    pub picks_emitted: u32,
    pub block_reasons: BTreeMap<String, u32>,
}
