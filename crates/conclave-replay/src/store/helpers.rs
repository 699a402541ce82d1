//! Helper functions for store module

use crate::error::Error;
use crate::event::{EventAction, LogEvent, LogLevel};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Format a timestamp for storage.
///
/// Fixed-width microsecond RFC 3339 so that text ordering in SQLite matches
/// chronological ordering.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp: {e}")))
}

/// Convert a SQLite row to a LogEvent
pub(crate) fn row_to_event(row: SqliteRow) -> Result<LogEvent, Error> {
    let id_str: String = row.get("id");
    let action_str: String = row.get("action");
    let level_str: String = row.get("level");
    let data_str: String = row.get("data");
    let created_at_str: String = row.get("created_at");

    let id =
        Uuid::parse_str(&id_str).map_err(|e| Error::Serialization(format!("invalid uuid: {e}")))?;
    let level: LogLevel = level_str
        .parse()
        .map_err(|e: String| Error::Serialization(e))?;
    let data: serde_json::Value = serde_json::from_str(&data_str)
        .map_err(|e| Error::Serialization(format!("invalid json: {e}")))?;

    Ok(LogEvent {
        id,
        conversation_id: row.get("conversation_id"),
        agent: row.get("agent"),
        action: EventAction::from(action_str),
        level,
        data,
        final_decision: row.get("final_decision"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

/// Get the default data directory for Conclave
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".conclave"))
        .unwrap_or_else(|| std::path::PathBuf::from(".conclave"))
}

/// Get the default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("conclave.db")
}
