//! SOS alert HTTP handlers.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use devasthan_alerts::SosAlert;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /api/v1/sos`.
#[derive(Debug, Deserialize)]
pub struct SosRequest {
    pub location_lat: f64,
    pub location_lon: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Response body for status transitions.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub message: &'static str,
    pub alert: SosAlert,
}

/// Handler for `POST /api/v1/sos`.
pub async fn submit_sos_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SosRequest>,
) -> Result<Json<SosAlert>, ApiError> {
    let alert = state
        .intake
        .submit_alert(
            payload.location_lat,
            payload.location_lon,
            payload.description,
            payload.user_id,
        )
        .await?;

    tracing::warn!(
        alert_id = alert.id,
        latitude = alert.location.latitude,
        longitude = alert.location.longitude,
        "sos alert raised"
    );
    Ok(Json(alert))
}

/// Handler for `GET /api/v1/sos_alerts`.
pub async fn active_alerts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<SosAlert>>, ApiError> {
    Ok(Json(state.intake.active_alerts().await?))
}

/// Handler for `PUT /api/v1/sos_alerts/{id}/acknowledge`.
pub async fn acknowledge_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let alert = state.intake.acknowledge_alert(id).await?;
    Ok(Json(TransitionResponse {
        message: "SOS alert acknowledged",
        alert,
    }))
}

/// Handler for `PUT /api/v1/sos_alerts/{id}/resolve`.
pub async fn resolve_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let alert = state.intake.resolve_alert(id).await?;
    Ok(Json(TransitionResponse {
        message: "SOS alert resolved",
        alert,
    }))
}
