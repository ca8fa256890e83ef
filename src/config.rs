use clap::Parser;

/// Pre-game odds value-detection pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "valuepicks-bot", version, about)]
pub struct Config {
    /// Deployment environment label (informational)
    #[arg(long, env = "APP_ENV", default_value = "dev")]
    pub app_env: String,

    /// SQLite database path; a sqlite:// prefix is tolerated
    #[arg(long, env = "DATABASE_URL", default_value = "valuepicks.db")]
    pub database_url: String,

    /// Minimum model edge over market consensus required to emit a pick
    #[arg(long, env = "EDGE_THRESHOLD", default_value = "0.03")]
    pub edge_threshold: f64,

    /// Odds snapshots older than this are flagged stale and excluded from
    /// consensus
    #[arg(long, env = "STALE_SNAPSHOT_MAX_AGE_SECONDS", default_value = "180")]
    pub stale_snapshot_max_age_seconds: u64,

    /// Legacy name for the stale snapshot age; wins over the long name
    /// when explicitly set
    #[arg(long, env = "STALE_SNAPSHOT_SECONDS")]
    pub stale_snapshot_seconds: Option<u64>,

    /// Minimum distinct books required to form a market consensus
    #[arg(long, env = "CONSENSUS_MIN_BOOKS", default_value = "3")]
    pub consensus_min_books: usize,

    /// Trim the single highest and lowest book probability when six or
    /// more books are available
    #[arg(long, env = "CONSENSUS_TRIM_OUTLIERS", default_value = "true")]
    pub consensus_trim_outliers: bool,

    /// Closing lines are captured within this many minutes before start
    #[arg(long, env = "CLOSE_CAPTURE_WINDOW_MINUTES", default_value = "10")]
    pub close_capture_window_minutes: i64,

    /// Start-time gap tolerated at full mapping confidence
    #[arg(long, env = "MAPPING_TIME_TOLERANCE_MINUTES", default_value = "15")]
    pub mapping_time_tolerance_minutes: i64,

    /// Events below this mapping confidence are quarantined
    #[arg(long, env = "MAPPING_CONFIDENCE_THRESHOLD", default_value = "0.9")]
    pub mapping_confidence_threshold: f64,

    /// HTTP API listen address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    pub api_addr: String,

    /// Directory holding serialized model artifacts
    #[arg(long, env = "ARTIFACT_DIR", default_value = "artifacts")]
    pub artifact_dir: String,

    /// Seconds between automatic pipeline sweeps (0 = admin-triggered only)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "0")]
    pub sweep_interval_secs: u64,

    /// Base URL of the HTTP odds feed; unset falls back to the mock provider
    #[arg(long, env = "ODDS_FEED_URL")]
    pub odds_feed_url: Option<String>,

    /// API key for the HTTP odds feed
    #[arg(long, env = "ODDS_FEED_API_KEY")]
    pub odds_feed_api_key: Option<String>,
}

impl Config {
    /// Effective stale-snapshot age: the legacy short name, when set, is an
    /// operator override; the explicit max-age name carries the default.
    pub fn stale_max_age_seconds(&self) -> u64 {
        self.stale_snapshot_seconds
            .unwrap_or(self.stale_snapshot_max_age_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("database_url must not be empty");
        }
        if !(0.0..=1.0).contains(&self.edge_threshold) {
            anyhow::bail!("edge_threshold must be between 0.0 and 1.0");
        }
        let stale = self.stale_max_age_seconds();
        if stale == 0 || stale > 86_400 {
            anyhow::bail!("stale snapshot age must be between 1 and 86400 seconds");
        }
        if self.consensus_min_books == 0 || self.consensus_min_books > 50 {
            anyhow::bail!("consensus_min_books must be between 1 and 50");
        }
        if !(1..=1_440).contains(&self.close_capture_window_minutes) {
            anyhow::bail!("close_capture_window_minutes must be between 1 and 1440");
        }
        if !(1..=1_440).contains(&self.mapping_time_tolerance_minutes) {
            anyhow::bail!("mapping_time_tolerance_minutes must be between 1 and 1440");
        }
        if !(0.0..=1.0).contains(&self.mapping_confidence_threshold) {
            anyhow::bail!("mapping_confidence_threshold must be between 0.0 and 1.0");
        }
        if self.artifact_dir.trim().is_empty() {
            anyhow::bail!("artifact_dir must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::parse_from(["valuepicks-bot"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.edge_threshold, 0.03);
        assert_eq!(config.stale_max_age_seconds(), 180);
        assert_eq!(config.consensus_min_books, 3);
    }

    #[test]
    fn test_legacy_stale_name_wins() {
        let config = Config::parse_from(["valuepicks-bot", "--stale-snapshot-seconds", "60"]);
        assert_eq!(config.stale_max_age_seconds(), 60);
    }

    #[test]
    fn test_bad_threshold_rejected() {
        let config = Config::parse_from(["valuepicks-bot", "--edge-threshold", "1.5"]);
        assert!(config.validate().is_err());
    }
}
