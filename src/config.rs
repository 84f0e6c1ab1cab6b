use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::query::TableRef;

pub const DEFAULT_DATABASE: &str = "football_db";
pub const DEFAULT_TABLE: &str = "live_portfolio_projected";
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(10 * 60);
pub const HISTORY_TTL: Duration = Duration::from_secs(60 * 60);
pub const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub table: TableRef,
    /// Ingestions before this instant are excluded from history views.
    pub valid_from: Option<DateTime<Utc>>,
    pub utc_offset: FixedOffset,
    pub snapshot_ttl: Duration,
    pub history_ttl: Duration,
}

impl DashboardConfig {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            valid_from: None,
            utc_offset: utc(),
            snapshot_ttl: SNAPSHOT_TTL,
            history_ttl: HISTORY_TTL,
        }
    }

    pub fn with_valid_from(mut self, valid_from: Option<DateTime<Utc>>) -> Self {
        self.valid_from = valid_from;
        self
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::new(TableRef::new(DEFAULT_DATABASE, DEFAULT_TABLE))
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

pub fn parse_valid_from(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}

pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }
    value
        .parse::<FixedOffset>()
        .map_err(|err| format!("expected an offset like +01:00: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_cache_windows() {
        let config = DashboardConfig::default();
        assert_eq!(config.snapshot_ttl, Duration::from_secs(600));
        assert_eq!(config.history_ttl, Duration::from_secs(3600));
        assert_eq!(config.table, TableRef::new("football_db", "live_portfolio_projected"));
        assert!(config.valid_from.is_none());
    }

    #[test]
    fn offsets_parse_from_text() {
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+01:00").unwrap().local_minus_utc(), 3600);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert!(parse_utc_offset("somewhere").is_err());
    }

    #[test]
    fn valid_from_requires_rfc3339() {
        let ts = parse_valid_from("2026-02-13T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-02-13T00:00:00+00:00");
        assert!(parse_valid_from("13/02/2026").is_err());
    }
}
