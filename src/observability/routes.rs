use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::MetricsConfig;
use crate::errors::GatewayError;
use crate::server::server::AppState;
use axum::routing::get;
use axum::Json;
use axum::{extract::State, response::IntoResponse, Router};
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const READINESS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<Registry>,
}

impl MetricsState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn router(&self, metrics_config: &MetricsConfig) -> Router<AppState> {
        let mut router = Router::new()
            .route("/healthz", get(get_health))
            .route("/readyz", get(get_ready));
        if metrics_config.is_enabled {
            router = router.route(metrics_config.path.as_str(), get(get_metrics));
        }
        router
    }
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", err);
        return (StatusCode::INTERNAL_SERVER_ERROR, [(CONTENT_TYPE, "text/plain")], String::new());
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
}

/// Cache snapshot, never triggers a fetch
async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.cache.status().await;
    (StatusCode::OK, Json(json!({ "status": "ok", "credential": status })))
}

/// Ready once a credential can be obtained
async fn get_ready(State(state): State<AppState>) -> impl IntoResponse {
    let cancel = CancellationToken::new();
    // giving up here leaves the refresh running for other callers
    let message = match tokio::time::timeout(READINESS_TIMEOUT, state.cache.get(&cancel)).await {
        Ok(Ok(_)) => return (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Ok(Err(err)) => GatewayError::from(err).safe_message(),
        Err(_) => "credential unavailable: timed out".to_owned(),
    };
    warn!(reason = %message, "readiness check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable", "reason": message })),
    )
}
