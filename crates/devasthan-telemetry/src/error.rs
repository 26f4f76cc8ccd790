//! Error types for the telemetry store.

/// Errors that can occur during telemetry store operations.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A database operation failed.
    #[error("telemetry database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The count does not fit the storage column.
    #[error("person count {0} exceeds the storable range")]
    CountOutOfRange(u64),
}
