//! Column conversions shared by the stores.
//!
//! Timestamps are stored as Unix milliseconds, ids as their string form.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};
use std::str::FromStr;

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// `at` as it reads back from a millisecond column.
pub(crate) fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

pub(crate) fn millis_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {ms}").into(),
        )
    })
}

pub(crate) fn opt_millis_col(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(idx)?;
    match ms {
        None => Ok(None),
        Some(_) => millis_col(row, idx).map(Some),
    }
}

/// Parses a TEXT column with `FromStr` (uuids, enum names).
pub(crate) fn parsed_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Whether `err` is a UNIQUE (or primary key) constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn millis_round_trip_keeps_precision() {
        let conn = Connection::open_in_memory().unwrap();
        let at = DateTime::from_timestamp_millis(1_718_000_000_123).unwrap();
        let back = conn
            .query_row("SELECT ?1", [to_millis(at)], |row| millis_col(row, 0))
            .unwrap();
        assert_eq!(back, at);
    }

    #[test]
    fn stored_precision_matches_what_reads_back() {
        let conn = Connection::open_in_memory().unwrap();
        let at = DateTime::from_timestamp(1_718_000_000, 123_456_789).unwrap();
        let back = conn
            .query_row("SELECT ?1", [to_millis(at)], |row| millis_col(row, 0))
            .unwrap();
        assert_ne!(back, at);
        assert_eq!(back, stored_precision(at));
    }

    #[test]
    fn null_timestamp_is_none() {
        let conn = Connection::open_in_memory().unwrap();
        let back = conn
            .query_row("SELECT NULL", [], |row| opt_millis_col(row, 0))
            .unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn detects_unique_violation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(is_unique_violation(&err));

        conn.execute_batch("CREATE TABLE n (k TEXT NOT NULL);").unwrap();
        let err = conn.execute("INSERT INTO n VALUES (NULL)", []).unwrap_err();
        assert!(!is_unique_violation(&err));
    }
}
