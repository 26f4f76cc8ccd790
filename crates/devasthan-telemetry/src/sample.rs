//! The stored telemetry record.

use chrono::{DateTime, Utc};
use devasthan_types::ZoneId;
use serde::{Deserialize, Serialize};

/// One immutable crowd-count observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Zone the count was observed in.
    pub zone: ZoneId,
    /// Number of people observed.
    pub count: u64,
    /// Instant assigned by the store at ingestion (microsecond precision).
    pub timestamp: DateTime<Utc>,
}
