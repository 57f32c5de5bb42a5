// src/repositories/rows.rs
//
// Column parsing shared by the SQLite repositories.
// Parse failures are explicit conversion errors, never silent defaults.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

pub(crate) fn parse_uuid(idx: usize, column: &str, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| conversion_error(idx, format!("Invalid {} UUID '{}': {}", column, value, e)))
}

pub(crate) fn parse_timestamp(
    idx: usize,
    column: &str,
    value: &str,
) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            conversion_error(idx, format!("Invalid {} timestamp '{}': {}", column, value, e))
        })
}
