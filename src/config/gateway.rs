use std::collections::HashMap;

use http::HeaderMap;
use serde::Deserialize;

use crate::config::settings::SettingsConfig;

pub const FRESHNESS_WINDOW_SECONDS_DEFAULT: u64 = 10 * 60 * 60;
pub const FETCH_TIMEOUT_SECONDS_DEFAULT: u64 = 30;
pub const REQUEST_TIMEOUT_SECONDS_DEFAULT: u64 = 30;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub credential: CredentialConfig,
    pub upstreams: HashMap<String, UpstreamConfig>,
}

/// ================================
/// Credential source
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    /// program printing the credential to stdout
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// max credential age before a get triggers a refresh
    #[serde(default = "default_freshness_window_seconds")]
    pub freshness_window_seconds: u64,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

/// ================================
/// Upstream REST services
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// origin only: scheme + host (+ port), no path
    pub base_url: String,
    pub tenant_header: String,
    pub tenant_id: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,
    /// static headers sent with every request
    #[serde(default, with = "http_serde::header_map")]
    pub headers: HeaderMap,
}

fn default_freshness_window_seconds() -> u64 {
    FRESHNESS_WINDOW_SECONDS_DEFAULT
}

fn default_fetch_timeout_seconds() -> u64 {
    FETCH_TIMEOUT_SECONDS_DEFAULT
}

fn default_request_timeout_seconds() -> u64 {
    REQUEST_TIMEOUT_SECONDS_DEFAULT
}
