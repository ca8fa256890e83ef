//! Team and event normalization.
//!
//! Raw provider team strings are resolved against the alias and canonical
//! team tables; events whose mapping quality falls below the configured
//! threshold are quarantined rather than dropped, so every anomaly leaves
//! a row with a reason.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::{self, models::*};

/// Outcome of resolving one raw team string.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub team_id: Option<i64>,
    pub confidence: f64,
    pub exact_alias_match: bool,
    pub multiple_candidates: bool,
}

/// Resolve a raw provider team name to a canonical team id.
///
/// Lookup order: exact alias match (ambiguous matches disqualify), then
/// the canonical `normalized_name`. Both the raw string and the tables
/// hold lowercase forms.
pub fn resolve_team(conn: &Connection, raw_name: &str) -> Result<Resolution> {
    let normalized = raw_name.to_lowercase();

    let aliases = db::alias_matches(conn, &normalized)?;
    if aliases.len() > 1 {
        return Ok(Resolution {
            team_id: None,
            confidence: 0.0,
            exact_alias_match: false,
            multiple_candidates: true,
        });
    }
    if let Some(alias) = aliases.first() {
        return Ok(Resolution {
            team_id: Some(alias.team_id),
            confidence: 1.0,
            exact_alias_match: true,
            multiple_candidates: false,
        });
    }

    if let Some(team) = db::find_team(conn, &normalized)? {
        return Ok(Resolution {
            team_id: Some(team.id),
            confidence: 1.0,
            exact_alias_match: true,
            multiple_candidates: false,
        });
    }

    Ok(Resolution {
        team_id: None,
        confidence: 0.0,
        exact_alias_match: false,
        multiple_candidates: false,
    })
}

/// Confidence band for the gap between the quoted start time and now:
/// within tolerance → 1.0, within 4x tolerance → 0.8, beyond → 0.0.
fn time_confidence(
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance_minutes: i64,
) -> (f64, Option<&'static str>) {
    let diff_minutes = (start_time - now).num_seconds().abs() as f64 / 60.0;
    if diff_minutes <= tolerance_minutes as f64 {
        return (1.0, None);
    }
    if diff_minutes <= (tolerance_minutes * 4) as f64 {
        return (0.8, Some("TIME_MISMATCH"));
    }
    (0.0, Some("TIME_MISMATCH"))
}

/// Resolve both team names and derive the event's mapping confidence and
/// quarantine state. Mutates `norm` in place; the caller persists it.
pub fn normalize_event(
    conn: &Connection,
    norm: &mut EventNormalized,
    home_name: &str,
    away_name: &str,
    now: DateTime<Utc>,
    tolerance_minutes: i64,
    confidence_threshold: f64,
) -> Result<()> {
    let home = resolve_team(conn, home_name)?;
    let away = resolve_team(conn, away_name)?;

    norm.home_team_id = home.team_id;
    norm.away_team_id = away.team_id;

    if home.multiple_candidates || away.multiple_candidates {
        norm.mapping_confidence = 0.0;
        norm.status = EventStatus::Quarantined;
        norm.quarantine_reason = Some("MULTIPLE_CANDIDATES".into());
        return Ok(());
    }

    if home.team_id.is_none() || away.team_id.is_none() {
        norm.mapping_confidence = 0.0;
        norm.status = EventStatus::Quarantined;
        norm.quarantine_reason = Some("NO_ALIAS_MATCH".into());
        return Ok(());
    }

    let (time_conf, time_reason) = time_confidence(norm.start_time, now, tolerance_minutes);
    norm.mapping_confidence = if home.exact_alias_match && away.exact_alias_match && time_conf == 1.0
    {
        1.0
    } else if time_conf == 0.8 {
        0.8
    } else {
        0.0
    };

    if norm.mapping_confidence < confidence_threshold {
        norm.status = EventStatus::Quarantined;
        norm.quarantine_reason = Some(time_reason.unwrap_or("LOW_MAPPING_CONFIDENCE").into());
    } else {
        norm.status = EventStatus::Scheduled;
        norm.quarantine_reason = None;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(db::SCHEMA_SQL).unwrap();
        conn
    }

    fn seed(conn: &Connection) -> (i64, i64, i64) {
        db::insert_league_if_missing(conn, "NBA").unwrap();
        db::insert_team_if_missing(conn, "los angeles lakers").unwrap();
        db::insert_team_if_missing(conn, "golden state warriors").unwrap();
        let league = db::find_league(conn, "NBA").unwrap().unwrap();
        let lakers = db::find_team(conn, "los angeles lakers").unwrap().unwrap();
        let warriors = db::find_team(conn, "golden state warriors").unwrap().unwrap();
        db::insert_alias_if_missing(conn, "la lakers", lakers.id, "test", 0.99).unwrap();
        db::insert_alias_if_missing(conn, "gs warriors", warriors.id, "test", 0.99).unwrap();
        (league.id, lakers.id, warriors.id)
    }

    fn make_norm(league_id: i64, start_time: DateTime<Utc>) -> EventNormalized {
        EventNormalized {
            id: Some(1),
            event_raw_id: 1,
            league_id,
            start_time,
            home_team_id: None,
            away_team_id: None,
            mapping_confidence: 0.0,
            status: EventStatus::Scheduled,
            quarantine_reason: None,
        }
    }

    #[test]
    fn test_deterministic_alias_mapping() {
        let conn = test_conn();
        let (league_id, lakers_id, warriors_id) = seed(&conn);
        let now = Utc::now();
        let mut norm = make_norm(league_id, now);
        normalize_event(&conn, &mut norm, "la lakers", "gs warriors", now, 15, 0.9).unwrap();
        assert_eq!(norm.mapping_confidence, 1.0);
        assert_eq!(norm.status, EventStatus::Scheduled);
        assert_eq!(norm.quarantine_reason, None);
        assert_eq!(norm.home_team_id, Some(lakers_id));
        assert_eq!(norm.away_team_id, Some(warriors_id));
    }

    #[test]
    fn test_canonical_name_fallback() {
        let conn = test_conn();
        let (league_id, lakers_id, _) = seed(&conn);
        let now = Utc::now();
        let mut norm = make_norm(league_id, now);
        // No alias row for the canonical spelling; the team table matches.
        normalize_event(
            &conn,
            &mut norm,
            "Los Angeles Lakers",
            "Golden State Warriors",
            now,
            15,
            0.9,
        )
        .unwrap();
        assert_eq!(norm.mapping_confidence, 1.0);
        assert_eq!(norm.home_team_id, Some(lakers_id));
    }

    #[test]
    fn test_quarantine_on_unknown_team() {
        let conn = test_conn();
        let (league_id, _, _) = seed(&conn);
        let now = Utc::now();
        let mut norm = make_norm(league_id, now);
        normalize_event(&conn, &mut norm, "unknown", "unknown2", now, 15, 0.9).unwrap();
        assert_eq!(norm.status, EventStatus::Quarantined);
        assert_eq!(norm.quarantine_reason.as_deref(), Some("NO_ALIAS_MATCH"));
        assert_eq!(norm.mapping_confidence, 0.0);
    }

    #[test]
    fn test_time_mismatch_soft_band() {
        let conn = test_conn();
        let (league_id, _, _) = seed(&conn);
        let now = Utc::now();
        // 30 minutes out with 15-minute tolerance: 0.8 band, below the
        // 0.9 threshold, so quarantined.
        let mut norm = make_norm(league_id, now + Duration::minutes(30));
        normalize_event(&conn, &mut norm, "la lakers", "gs warriors", now, 15, 0.9).unwrap();
        assert_eq!(norm.mapping_confidence, 0.8);
        assert_eq!(norm.status, EventStatus::Quarantined);
        assert_eq!(norm.quarantine_reason.as_deref(), Some("TIME_MISMATCH"));
    }

    #[test]
    fn test_time_mismatch_hard_band() {
        let conn = test_conn();
        let (league_id, _, _) = seed(&conn);
        let now = Utc::now();
        let mut norm = make_norm(league_id, now + Duration::minutes(120));
        normalize_event(&conn, &mut norm, "la lakers", "gs warriors", now, 15, 0.9).unwrap();
        assert_eq!(norm.mapping_confidence, 0.0);
        assert_eq!(norm.status, EventStatus::Quarantined);
        assert_eq!(norm.quarantine_reason.as_deref(), Some("TIME_MISMATCH"));
    }
}
