//! Devasthan server library logic.

pub mod api;
pub mod api_crowd;
pub mod api_sos;
pub mod api_ws;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod intake;
pub mod simulator;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Extension, Json, Router,
};
use devasthan_db::DbPool;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::CoreError;
pub use gateway::IngestionGateway;
pub use hub::{
    BroadcastHub, BroadcastReport, DeliveryError, HubSettings, ObserverId, ObserverSink, ObserverState,
    RemovalNotice,
};
pub use intake::AlertIntake;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live observer registry.
    pub hub: BroadcastHub,
    /// Crowd telemetry entry point.
    pub gateway: IngestionGateway,
    /// SOS alert entry point.
    pub intake: AlertIntake,
    /// Origins allowed by the CORS layer. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Wires the gateway and the alert intake onto one pool and one hub.
    pub fn new(pool: DbPool, hub: BroadcastHub, cors_origins: Vec<String>) -> Self {
        Self {
            gateway: IngestionGateway::new(pool.clone(), hub.clone()),
            intake: AlertIntake::new(pool, hub.clone()),
            hub,
            cors_origins,
        }
    }
}

/// Maximum request body size (64 KiB). Every accepted payload is a small JSON object.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "observers": state.hub.connected_count().await,
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable cors origin");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(parsed))
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/crowd_data",
            post(api_crowd::submit_crowd_data_handler),
        )
        .route(
            "/api/v1/crowd_data/history",
            get(api_crowd::history_handler),
        )
        .route("/api/v1/crowd_data/zones", get(api_crowd::zones_handler))
        .route(
            "/api/v1/crowd_data/zones/{zone}",
            get(api_crowd::zone_latest_handler),
        )
        .route("/api/v1/live_data", get(api_crowd::live_data_handler))
        .route(
            "/api/v1/prescriptive_alert",
            get(api_crowd::prescriptive_alert_handler),
        )
        .route("/api/v1/sos", post(api_sos::submit_sos_handler))
        .route("/api/v1/sos_alerts", get(api_sos::active_alerts_handler))
        .route(
            "/api/v1/sos_alerts/{id}/acknowledge",
            put(api_sos::acknowledge_handler),
        )
        .route(
            "/api/v1/sos_alerts/{id}/resolve",
            put(api_sos::resolve_handler),
        )
        .route("/ws/live", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_app(origins: Vec<String>) -> Router {
        let pool = devasthan_db::create_pool(
            ":memory:",
            devasthan_db::DbRuntimeSettings {
                busy_timeout_ms: 1_000,
                pool_max_size: 1,
            },
        )
        .unwrap();
        devasthan_db::run_migrations(&pool.get().unwrap()).unwrap();
        app(AppState::new(pool, BroadcastHub::default(), origins))
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let response = test_app(Vec::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["observers"], 0);
    }

    #[tokio::test]
    async fn cors_allows_configured_dashboard_origin() {
        let response = test_app(vec!["http://localhost:3000".to_string()])
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live_data")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn unknown_alert_id_is_not_found() {
        let response = test_app(Vec::new())
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/sos_alerts/77/resolve")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
