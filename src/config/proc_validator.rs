//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String> and reports them at once
//! - Upstream origins, tenant headers and static headers are checked with the
//!   same parsers the executor uses, so a config that validates also builds

use anyhow::{bail, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::gateway::{CredentialConfig, ServiceConfig, UpstreamConfig};
use crate::config::settings::SettingsConfig;
use crate::executor::endpoint::BaseOrigin;
use crate::executor::headers::{validate_static_headers, TenantHeader};
use crate::observability::metrics::get_metrics;

const RESERVED_PATHS: [&str; 2] = ["/healthz", "/readyz"];

/// Public entrypoint: returns Ok(()) or an error listing every issue found.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_credential(&cfg.credential, &mut errors);

    if cfg.upstreams.is_empty() {
        errors.push("config: 'upstreams' is empty; at least one upstream required".to_string());
    }

    let mut names: Vec<&String> = cfg.upstreams.keys().collect();
    names.sort();
    for name in names {
        validate_upstream(name, &cfg.upstreams[name], &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        return Ok(());
    }

    error!("configuration validation errors ({}):", errors.len());
    for e in &errors {
        error!(" - {}", e);
    }
    get_metrics().await.config_validation_errors.inc();
    bail!(
        "config is not valid, total errors: {}, \n{}",
        errors.len(),
        errors.join("\n")
    )
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be a valid port",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }
    if RESERVED_PATHS.contains(&metrics.path.as_str()) {
        errors.push(format!(
            "settings.metrics.path '{}' is reserved",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        if EnvFilter::try_new(&logging.level).is_err() {
            errors.push(format!(
                "settings.logging.level '{}' is not a valid filter",
                logging.level
            ));
        }
    }
}

/// CREDENTIAL VALIDATION
fn validate_credential(credential: &CredentialConfig, errors: &mut Vec<String>) {
    if credential.command.trim().is_empty() {
        errors.push("credential.command must not be empty".to_string());
    }
    if credential.freshness_window_seconds == 0 {
        errors.push("credential.freshness_window_seconds must be > 0".to_string());
    }
    if credential.fetch_timeout_seconds == 0 {
        errors.push("credential.fetch_timeout_seconds must be > 0".to_string());
    }
}

/// UPSTREAM VALIDATION
fn validate_upstream(name: &str, upstream: &UpstreamConfig, errors: &mut Vec<String>) {
    if let Err(err) = BaseOrigin::parse(&upstream.base_url) {
        errors.push(format!("upstreams['{}'].base_url: {}", name, err));
    }

    match TenantHeader::parse(&upstream.tenant_header, &upstream.tenant_id) {
        Ok(tenant) => {
            if let Err(err) = validate_static_headers(&upstream.headers, &tenant) {
                errors.push(format!("upstreams['{}'].headers: {}", name, err));
            }
        }
        Err(err) => errors.push(format!("upstreams['{}'].tenant: {}", name, err)),
    }

    if upstream.timeout_seconds == 0 {
        errors.push(format!("upstreams['{}'].timeout_seconds must be > 0", name));
    }
}
