//! Database access for wastewatch-ai
//!
//! Free functions over `sqlx`. Single-statement functions accept any SQLite
//! executor (pool, pooled connection or open transaction); functions that
//! issue several statements take `&mut SqliteConnection` so callers can run
//! them inside a transaction.

pub mod analysis;
pub mod audit;
pub mod hotspots;
pub mod locations;
pub mod queue;
pub mod reports;
pub mod users;
pub mod waste_types;

use chrono::{DateTime, NaiveDate, Utc};
use wastewatch_common::{Error, Result};

/// Format used for `DATE` columns
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Internal(format!("Invalid date '{}': {}", value, e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_accepts_rfc3339_and_sqlite_default() {
        let a = parse_timestamp("2026-10-01T08:30:00+00:00").unwrap();
        let b = parse_timestamp("2026-10-01 08:30:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(format_date(date), "2026-10-16");
        assert_eq!(parse_date("2026-10-16").unwrap(), date);
    }
}
