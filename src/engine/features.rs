//! Pre-game feature construction.
//!
//! The current feature set is a fixed baseline: the contract is that the
//! same `(event, as_of)` pair always produces the same record, so feature
//! snapshots are reproducible across reruns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FEATURE_VERSION: &str = "v1";

/// The model-facing feature columns, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub team_win_loss_home_away: f64,
    pub recent_form_last_n: f64,
    pub head_to_head: f64,
    pub rest_days_density: f64,
    pub off_def_efficiency: f64,
    pub home_court_advantage: f64,
}

/// A feature record for one normalized event at a given time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PregameFeatures {
    pub event_id: i64,
    #[serde(flatten)]
    pub row: FeatureRow,
    pub as_of: DateTime<Utc>,
}

/// Baseline feature structure for pre-game moneyline modeling.
pub fn build_pregame_features(event_id: i64, as_of: DateTime<Utc>) -> PregameFeatures {
    PregameFeatures {
        event_id,
        row: FeatureRow {
            team_win_loss_home_away: 0.52,
            recent_form_last_n: 0.5,
            head_to_head: 0.5,
            rest_days_density: 0.0,
            off_def_efficiency: 0.0,
            home_court_advantage: 1.0,
        },
        as_of,
    }
}
