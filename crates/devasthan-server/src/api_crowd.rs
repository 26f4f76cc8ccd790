//! Crowd telemetry HTTP handlers.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json, Path, Query};
use chrono::{DateTime, TimeZone, Utc};
use devasthan_sutradhar::{classify, rule_for, SeverityTier};
use devasthan_telemetry::TelemetrySample;
use devasthan_types::CrowdUpdate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default page size for `GET /api/v1/crowd_data/history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Largest page `GET /api/v1/crowd_data/history` will return.
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Zone reported by `live_data` before any reading exists.
const SENTINEL_ZONE: &str = "main_entrance";

/// Request body for `POST /api/v1/crowd_data`.
#[derive(Debug, Deserialize)]
pub struct CrowdDataRequest {
    pub location_id: String,
    pub person_count: i64,
}

/// Response body for `GET /api/v1/live_data`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LiveDataResponse {
    pub current_count: u64,
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
}

impl LiveDataResponse {
    fn sentinel() -> Self {
        Self {
            current_count: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            location_id: SENTINEL_ZONE.to_string(),
        }
    }
}

impl From<TelemetrySample> for LiveDataResponse {
    fn from(sample: TelemetrySample) -> Self {
        Self {
            current_count: sample.count,
            timestamp: sample.timestamp,
            location_id: sample.zone.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Response body for `GET /api/v1/prescriptive_alert`.
#[derive(Debug, Serialize)]
pub struct PrescriptiveAlertResponse {
    /// Zone of the newest reading, absent before the first reading.
    pub location_id: Option<String>,
    pub current_count: u64,
    pub tier: SeverityTier,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub actions: &'static [&'static str],
    pub visitor_notice: Option<&'static str>,
}

/// Handler for `POST /api/v1/crowd_data`.
pub async fn submit_crowd_data_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CrowdDataRequest>,
) -> Result<Json<CrowdUpdate>, ApiError> {
    let update = state
        .gateway
        .ingest(&payload.location_id, payload.person_count)
        .await?;
    Ok(Json(update))
}

/// Handler for `GET /api/v1/live_data`.
pub async fn live_data_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<LiveDataResponse>, ApiError> {
    let live = match state.gateway.latest().await? {
        Some(sample) => sample.into(),
        None => LiveDataResponse::sentinel(),
    };
    Ok(Json(live))
}

/// Handler for `GET /api/v1/crowd_data/history`.
pub async fn history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TelemetrySample>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Ok(Json(state.gateway.history(limit).await?))
}

/// Handler for `GET /api/v1/crowd_data/zones`.
pub async fn zones_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<TelemetrySample>>, ApiError> {
    Ok(Json(state.gateway.zones().await?))
}

/// Handler for `GET /api/v1/crowd_data/zones/{zone}`.
pub async fn zone_latest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(zone): Path<String>,
) -> Result<Json<TelemetrySample>, ApiError> {
    state
        .gateway
        .latest_in_zone(&zone)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no readings for zone {zone}")))
}

/// Handler for `GET /api/v1/prescriptive_alert`.
pub async fn prescriptive_alert_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<PrescriptiveAlertResponse>, ApiError> {
    let latest = state.gateway.latest().await?;
    let count = latest.as_ref().map_or(0, |s| s.count);
    let classification = classify(count);

    Ok(Json(PrescriptiveAlertResponse {
        location_id: latest.map(|s| s.zone.to_string()),
        current_count: count,
        tier: classification.tier,
        message: classification.message,
        suggestion: classification.suggestion,
        actions: classification.actions,
        visitor_notice: rule_for(count).visitor_notice,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_matches_empty_store_contract() {
        let json = serde_json::to_value(LiveDataResponse::sentinel()).unwrap();
        assert_eq!(json["current_count"], 0);
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(json["location_id"], "main_entrance");
    }
}
