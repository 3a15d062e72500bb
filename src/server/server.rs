use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::gateway::GatewayCache;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub cache: Arc<GatewayCache>,
}

impl AppState {
    pub fn new(metrics: &Metrics, cache: Arc<GatewayCache>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            cache,
        }
    }
}

/// Serve health, readiness and (when enabled) metrics until `shutdown` fires.
pub async fn start(
    settings_config: &SettingsConfig,
    cache: Arc<GatewayCache>,
    shutdown: CancellationToken,
) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, cache);

    let app = Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state);

    let bind_addr = &settings_config.server.host;
    let port = &settings_config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    info!(address = %bind_addr, port = %port, "server listening");
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    metrics.up.set(0);
    info!("server stopped");
    Ok(())
}
