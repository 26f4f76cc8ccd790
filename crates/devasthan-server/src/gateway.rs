//! Telemetry ingestion: persist, classify, fan out.

use chrono::{Local, Timelike, Utc};
use devasthan_db::DbPool;
use devasthan_sutradhar::{classify, rush_period, Classification};
use devasthan_telemetry::{
    latest_for_zone, latest_per_zone, latest_sample, latest_samples, record_sample,
    TelemetrySample,
};
use devasthan_types::{CrowdUpdate, LiveEvent, ZoneId};

use crate::error::{with_conn, CoreError};
use crate::hub::BroadcastHub;

/// Single entry point for new crowd readings.
#[derive(Clone)]
pub struct IngestionGateway {
    pool: DbPool,
    hub: BroadcastHub,
}

impl IngestionGateway {
    pub fn new(pool: DbPool, hub: BroadcastHub) -> Self {
        Self { pool, hub }
    }

    /// Records a reading and pushes the resulting `crowd_update` to every
    /// connected observer.
    ///
    /// The call succeeds once the sample is durable; how many observers
    /// actually receive the event does not affect the result.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed zone or negative count (nothing is
    /// stored), `StorageUnavailable` if the write fails.
    pub async fn ingest(&self, zone: &str, count: i64) -> Result<CrowdUpdate, CoreError> {
        let zone = ZoneId::parse(zone).map_err(|e| CoreError::InvalidInput(e.to_string()))?;
        let count = u64::try_from(count).map_err(|_| {
            CoreError::InvalidInput(format!("person count must be non-negative, got {count}"))
        })?;

        let sample = with_conn(&self.pool, move |conn| {
            Ok(record_sample(conn, &zone, count, Utc::now())?)
        })
        .await?;

        let classification = classify(sample.count);
        log_orchestration(&sample, &classification, Local::now().hour());

        let update = CrowdUpdate {
            zone: sample.zone,
            count: sample.count,
            timestamp: sample.timestamp,
            tier: classification.tier,
            message: classification.message.to_string(),
            suggestion: classification.suggestion.to_string(),
        };

        let report = self.hub.broadcast(&LiveEvent::CrowdUpdate(update.clone())).await;
        tracing::debug!(
            zone = %update.zone,
            attempted = report.attempted,
            enqueued = report.enqueued,
            dropped = report.dropped,
            "crowd update fanned out"
        );

        Ok(update)
    }

    /// Newest sample across all zones.
    pub async fn latest(&self) -> Result<Option<TelemetrySample>, CoreError> {
        with_conn(&self.pool, |conn| Ok(latest_sample(conn)?)).await
    }

    /// Up to `limit` samples, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<TelemetrySample>, CoreError> {
        with_conn(&self.pool, move |conn| Ok(latest_samples(conn, limit)?)).await
    }

    /// Newest sample of one zone.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed zone id.
    pub async fn latest_in_zone(&self, zone: &str) -> Result<Option<TelemetrySample>, CoreError> {
        let zone = ZoneId::parse(zone).map_err(|e| CoreError::InvalidInput(e.to_string()))?;
        with_conn(&self.pool, move |conn| Ok(latest_for_zone(conn, &zone)?)).await
    }

    /// Newest sample of every zone.
    pub async fn zones(&self) -> Result<Vec<TelemetrySample>, CoreError> {
        with_conn(&self.pool, |conn| Ok(latest_per_zone(conn)?)).await
    }
}

fn log_orchestration(sample: &TelemetrySample, classification: &Classification, hour: u32) {
    tracing::info!(
        zone = %sample.zone,
        count = sample.count,
        tier = %classification.tier,
        suggestion = classification.suggestion,
        "{}",
        classification.message
    );
    for action in classification.actions {
        tracing::info!(zone = %sample.zone, tier = %classification.tier, action = *action, "recommended action");
    }
    if let Some(period) = rush_period(hour) {
        tracing::info!(hour, period = ?period, "{}", period.commentary());
    }
}
