use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Credential metrics
    pub credential_fetches: IntCounterVec,
    pub credential_fetch_duration: Histogram,
    pub credential_cache_hits: IntCounter,
    pub credential_refresh_waiters: IntCounter,

    // Upstream metrics
    pub upstream_requests: IntCounterVec,
    pub upstream_auth_retries: IntCounterVec,
    pub upstream_request_duration: HistogramVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    // metric names and label sets are static, registration cannot fail at runtime
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokengateway".into()), None).expect("metrics registry");

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Credential
            credential_fetches: IntCounterVec::new(Opts::new("credential_fetches_total", "Credential fetches by outcome"), &["outcome"]).expect("metric"),
            credential_fetch_duration: Histogram::with_opts(HistogramOpts::new("credential_fetch_duration_seconds", "Credential fetch duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])).expect("metric"),
            credential_cache_hits: IntCounter::new("credential_cache_hits_total", "Credential served from cache").expect("metric"),
            credential_refresh_waiters: IntCounter::new("credential_refresh_waiters_total", "Callers that joined a refresh in flight").expect("metric"),

            // Upstream
            upstream_requests: IntCounterVec::new(Opts::new("upstream_requests_total", "Upstream requests by status class"), &["service", "method", "status_class"]).expect("metric"),
            upstream_auth_retries: IntCounterVec::new(Opts::new("upstream_auth_retries_total", "Retries after a 401/403"), &["service"]).expect("metric"),
            upstream_request_duration: HistogramVec::new(HistogramOpts::new("upstream_request_duration_seconds", "Upstream call duration seconds, retry included").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["service"]).expect("metric"),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").expect("metric"),
            up: IntGauge::new("up", "1 if service is healthy").expect("metric"),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        for collector in [
            Box::new(metrics.credential_fetches.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.credential_fetch_duration.clone()),
            Box::new(metrics.credential_cache_hits.clone()),
            Box::new(metrics.credential_refresh_waiters.clone()),
            Box::new(metrics.upstream_requests.clone()),
            Box::new(metrics.upstream_auth_retries.clone()),
            Box::new(metrics.upstream_request_duration.clone()),
            Box::new(metrics.config_validation_errors.clone()),
            Box::new(metrics.up.clone()),
        ] {
            reg.register(collector).expect("metric registration");
        }

        metrics
    }
}
