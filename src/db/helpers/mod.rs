use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Accepts the RFC 3339 timestamps this crate writes and SQLite's own
/// `CURRENT_TIMESTAMP` form for rows edited by hand.
pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| anyhow!("failed to parse {field} from {value:?}"))
}
