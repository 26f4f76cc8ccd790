//! Error taxonomy surfaced by the core to its callers.

use devasthan_alerts::AlertError;
use devasthan_telemetry::TelemetryError;
use thiserror::Error;

/// Errors returned by ingestion and alert operations.
///
/// Observer delivery failures never appear here; the hub absorbs them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input. Nothing was persisted or broadcast.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No alert with this id exists.
    #[error("sos alert not found: {0}")]
    NotFound(i64),

    /// The store could not be reached or rejected the write.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<r2d2::Error> for CoreError {
    fn from(e: r2d2::Error) -> Self {
        Self::StorageUnavailable(format!("pool error: {e}"))
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageUnavailable(format!("db error: {e}"))
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::StorageUnavailable(format!("storage task failed: {e}"))
    }
}

impl From<TelemetryError> for CoreError {
    fn from(e: TelemetryError) -> Self {
        match e {
            TelemetryError::CountOutOfRange(_) => Self::InvalidInput(e.to_string()),
            TelemetryError::Database(db) => db.into(),
        }
    }
}

impl From<AlertError> for CoreError {
    fn from(e: AlertError) -> Self {
        match e {
            AlertError::NotFound(id) => Self::NotFound(id),
            AlertError::DescriptionTooLong { .. } => Self::InvalidInput(e.to_string()),
            AlertError::Database(db) => db.into(),
        }
    }
}

/// Runs a blocking store operation on a pooled connection.
///
/// Pool checkout failures and panics in the blocking task both surface as
/// [`CoreError::StorageUnavailable`].
pub(crate) async fn with_conn<T, F>(pool: &devasthan_db::DbPool, f: F) -> Result<T, CoreError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, CoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        f(&*conn)
    })
    .await?
}
