//! Persistence operations for the crowd telemetry series.
//!
//! All writes go through [`record_sample`], which assigns the stored
//! timestamp and inserts in a single statement. Reads are ordered newest
//! first.

use chrono::{DateTime, Utc};
use devasthan_types::ZoneId;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::TelemetryError;
use crate::sample::TelemetrySample;

const SAMPLE_COLUMNS: &str = "recorded_at_us, zone_id, person_count";

/// Appends a sample and returns it as stored.
///
/// The stored timestamp is `observed_at`, unless that is not after the newest
/// timestamp in the table, in which case it is one microsecond past it. The
/// series is therefore strictly increasing across all zones, even when the
/// wall clock moves backwards, and the newest write is always the latest
/// sample. The whole decision runs inside one INSERT, so concurrent writers
/// on other pooled connections cannot claim the same instant.
///
/// # Errors
///
/// Returns `TelemetryError::Database` on SQL failure and
/// `TelemetryError::CountOutOfRange` if `count` exceeds `i64::MAX`.
pub fn record_sample(
    conn: &Connection,
    zone: &ZoneId,
    count: u64,
    observed_at: DateTime<Utc>,
) -> Result<TelemetrySample, TelemetryError> {
    let stored_count = i64::try_from(count).map_err(|_| TelemetryError::CountOutOfRange(count))?;
    let candidate_us = observed_at.timestamp_micros();

    let recorded_at_us: i64 = conn.query_row(
        "INSERT INTO crowd_data (recorded_at_us, zone_id, person_count)
         SELECT
            CASE WHEN newest IS NULL OR ?3 > newest THEN ?3 ELSE newest + 1 END,
            ?1,
            ?2
         FROM (SELECT MAX(recorded_at_us) AS newest FROM crowd_data)
         RETURNING recorded_at_us",
        params![zone.as_str(), stored_count, candidate_us],
        |row| row.get(0),
    )?;

    if recorded_at_us != candidate_us {
        tracing::debug!(
            zone = %zone,
            candidate_us,
            recorded_at_us,
            "adjusted telemetry timestamp to keep the series unique and ordered"
        );
    }

    Ok(TelemetrySample {
        zone: zone.clone(),
        count,
        timestamp: micros_to_datetime(recorded_at_us, 0)?,
    })
}

/// Returns the newest sample across all zones, or `None` if the store is empty.
///
/// # Errors
///
/// Returns `TelemetryError::Database` on SQL failure.
pub fn latest_sample(conn: &Connection) -> Result<Option<TelemetrySample>, TelemetryError> {
    let sample = conn
        .query_row(
            &format!(
                "SELECT {SAMPLE_COLUMNS} FROM crowd_data
                 ORDER BY recorded_at_us DESC, zone_id DESC
                 LIMIT 1"
            ),
            [],
            map_row_to_sample,
        )
        .optional()?;
    Ok(sample)
}

/// Returns up to `limit` samples across all zones, newest first.
///
/// # Errors
///
/// Returns `TelemetryError::Database` on SQL failure.
pub fn latest_samples(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<TelemetrySample>, TelemetryError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAMPLE_COLUMNS} FROM crowd_data
         ORDER BY recorded_at_us DESC, zone_id DESC
         LIMIT ?1"
    ))?;

    let rows = stmt.query_map([limit], map_row_to_sample)?;
    let mut samples = Vec::new();
    for row in rows {
        samples.push(row?);
    }
    Ok(samples)
}

/// Returns the newest sample for a single zone.
///
/// # Errors
///
/// Returns `TelemetryError::Database` on SQL failure.
pub fn latest_for_zone(
    conn: &Connection,
    zone: &ZoneId,
) -> Result<Option<TelemetrySample>, TelemetryError> {
    let sample = conn
        .query_row(
            &format!(
                "SELECT {SAMPLE_COLUMNS} FROM crowd_data
                 WHERE zone_id = ?1
                 ORDER BY recorded_at_us DESC
                 LIMIT 1"
            ),
            [zone.as_str()],
            map_row_to_sample,
        )
        .optional()?;
    Ok(sample)
}

/// Returns the newest sample of every zone that has reported, newest first.
///
/// # Errors
///
/// Returns `TelemetryError::Database` on SQL failure.
pub fn latest_per_zone(conn: &Connection) -> Result<Vec<TelemetrySample>, TelemetryError> {
    let mut stmt = conn.prepare(
        "SELECT c.recorded_at_us, c.zone_id, c.person_count
         FROM crowd_data c
         JOIN (
            SELECT zone_id, MAX(recorded_at_us) AS newest
            FROM crowd_data
            GROUP BY zone_id
         ) m ON c.zone_id = m.zone_id AND c.recorded_at_us = m.newest
         ORDER BY c.recorded_at_us DESC, c.zone_id ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_sample)?;
    let mut samples = Vec::new();
    for row in rows {
        samples.push(row?);
    }
    Ok(samples)
}

fn map_row_to_sample(row: &Row) -> rusqlite::Result<TelemetrySample> {
    let recorded_at_us: i64 = row.get(0)?;
    let zone_raw: String = row.get(1)?;
    let count: i64 = row.get(2)?;

    let zone = ZoneId::parse(&zone_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let count = u64::try_from(count).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(2, count))?;

    Ok(TelemetrySample {
        zone,
        count,
        timestamp: micros_to_datetime(recorded_at_us, 0)?,
    })
}

fn micros_to_datetime(micros: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}
