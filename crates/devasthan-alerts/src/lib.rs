//! SOS alert registry for the Devasthan platform.
//!
//! Alerts are created by the report-intake layer and then only move
//! forward through their lifecycle:
//!
//! ```text
//! new ──► acknowledged ──► resolved
//!  └──────────────────────────▲
//! ```
//!
//! Acknowledging or resolving is idempotent. Acknowledging a resolved alert
//! is accepted and leaves it resolved. Alerts are never deleted here.
//!
//! Every mutation is a single SQL statement, so concurrent callers on
//! different pooled connections observe a linearizable history per alert.

use chrono::{DateTime, Utc};
use devasthan_types::{AlertStatus, GeoPoint, SosAlertEvent};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an alert description, in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 2_048;

/// Errors that can occur during alert operations.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("sos alert not found: {0}")]
    NotFound(i64),
    #[error("description exceeds {max} bytes (got {len})")]
    DescriptionTooLong { len: usize, max: usize },
}

/// A persisted SOS alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    /// Identity of the reporter, if known. Lookup-only; never dereferenced here.
    pub reporter_id: Option<i64>,
    pub description: Option<String>,
    pub status: AlertStatus,
}

impl SosAlert {
    /// Builds the `sos_alert` live-event payload for this alert.
    pub fn to_event(&self) -> SosAlertEvent {
        SosAlertEvent {
            id: self.id,
            timestamp: self.timestamp,
            location: self.location,
            status: self.status,
            description: self.description.clone(),
        }
    }
}

/// Parameters for reporting a new alert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub location: GeoPoint,
    pub description: Option<String>,
    pub reporter_id: Option<i64>,
}

/// Outcome of an acknowledge or resolve call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// The alert as it stands after the call.
    pub alert: SosAlert,
    /// `false` when the call was an idempotent no-op.
    pub changed: bool,
}

const ALERT_COLUMNS: &str =
    "id, created_at_us, latitude, longitude, status, reporter_id, description";

/// Persists a new alert with status `new` and returns it.
///
/// A blank description is stored as `NULL`.
///
/// # Errors
///
/// Returns `AlertError::DescriptionTooLong` for oversized descriptions and
/// `AlertError::Database` on SQL failure.
pub fn create_alert(
    conn: &Connection,
    params: &NewAlert,
    created_at: DateTime<Utc>,
) -> Result<SosAlert, AlertError> {
    let description = params
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(d) = description {
        if d.len() > MAX_DESCRIPTION_LEN {
            return Err(AlertError::DescriptionTooLong {
                len: d.len(),
                max: MAX_DESCRIPTION_LEN,
            });
        }
    }

    let alert = conn.query_row(
        &format!(
            "INSERT INTO sos_alerts (created_at_us, latitude, longitude, status, reporter_id, description)
             VALUES (?1, ?2, ?3, 'new', ?4, ?5)
             RETURNING {ALERT_COLUMNS}"
        ),
        params![
            created_at.timestamp_micros(),
            params.location.latitude,
            params.location.longitude,
            params.reporter_id,
            description,
        ],
        map_row_to_alert,
    )?;

    tracing::info!(
        alert_id = alert.id,
        latitude = alert.location.latitude,
        longitude = alert.location.longitude,
        "sos alert created"
    );

    Ok(alert)
}

/// Retrieves an alert by id.
pub fn get_alert(conn: &Connection, id: i64) -> Result<SosAlert, AlertError> {
    conn.query_row(
        &format!("SELECT {ALERT_COLUMNS} FROM sos_alerts WHERE id = ?1"),
        [id],
        map_row_to_alert,
    )
    .optional()?
    .ok_or(AlertError::NotFound(id))
}

/// Marks an alert acknowledged.
///
/// Only a `new` alert changes; an acknowledged or resolved alert is
/// returned unchanged with `changed = false`.
///
/// # Errors
///
/// Returns `AlertError::NotFound` if no alert has this id.
pub fn acknowledge_alert(conn: &Connection, id: i64) -> Result<StatusChange, AlertError> {
    transition(conn, id, AlertStatus::Acknowledged, "status = 'new'")
}

/// Marks an alert resolved. Terminal.
///
/// # Errors
///
/// Returns `AlertError::NotFound` if no alert has this id.
pub fn resolve_alert(conn: &Connection, id: i64) -> Result<StatusChange, AlertError> {
    transition(conn, id, AlertStatus::Resolved, "status <> 'resolved'")
}

fn transition(
    conn: &Connection,
    id: i64,
    target: AlertStatus,
    guard: &str,
) -> Result<StatusChange, AlertError> {
    let updated = conn
        .query_row(
            &format!(
                "UPDATE sos_alerts SET status = ?2
                 WHERE id = ?1 AND {guard}
                 RETURNING {ALERT_COLUMNS}"
            ),
            params![id, target.as_str()],
            map_row_to_alert,
        )
        .optional()?;

    match updated {
        Some(alert) => {
            tracing::info!(alert_id = id, status = %alert.status, "sos alert status changed");
            Ok(StatusChange {
                alert,
                changed: true,
            })
        }
        None => {
            // Either unknown, or already at/after the target. Alerts are never
            // deleted, so this read cannot race with a removal.
            let alert = get_alert(conn, id)?;
            tracing::debug!(
                alert_id = id,
                status = %alert.status,
                requested = %target,
                "sos alert transition was a no-op"
            );
            Ok(StatusChange {
                alert,
                changed: false,
            })
        }
    }
}

/// Lists alerts that are `new` or `acknowledged`, newest first.
pub fn active_alerts(conn: &Connection) -> Result<Vec<SosAlert>, AlertError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALERT_COLUMNS} FROM sos_alerts
         WHERE status IN ('new', 'acknowledged')
         ORDER BY created_at_us DESC, id DESC"
    ))?;

    let rows = stmt.query_map([], map_row_to_alert)?;
    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(row?);
    }
    Ok(alerts)
}

fn map_row_to_alert(row: &Row) -> rusqlite::Result<SosAlert> {
    let created_at_us: i64 = row.get(1)?;
    let timestamp = DateTime::from_timestamp_micros(created_at_us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, created_at_us))?;

    let status_raw: String = row.get(4)?;
    let status = status_raw.parse::<AlertStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SosAlert {
        id: row.get(0)?,
        timestamp,
        location: GeoPoint {
            latitude: row.get(2)?,
            longitude: row.get(3)?,
        },
        reporter_id: row.get(5)?,
        description: row.get(6)?,
        status,
    })
}
