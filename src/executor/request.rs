use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::credential::Credential;
use crate::cache::credential_cache::CredentialCache;
use crate::config::gateway::UpstreamConfig;
use crate::errors::{GatewayError, TransportPhase};
use crate::executor::endpoint::BaseOrigin;
use crate::executor::headers::{request_headers, validate_static_headers, TenantHeader};
use crate::executor::upstream_error::upstream_error;
use crate::helpers::sanitize::{sanitize, sanitize_bounded};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::sources::fetch::CredentialFetcher;

const MAX_OPERATION_PATH_BYTES: usize = 256;

/// Successful (2xx) upstream response.
///
/// Headers are always returned since callers read cursors, counts and links
/// from them; `body` is `None` when the response had no body.
#[derive(Debug)]
pub struct UpstreamResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<T>,
}

/// Executes calls against one upstream service with the shared credential.
pub struct RequestExecutor<F> {
    service: String,
    origin: BaseOrigin,
    tenant: TenantHeader,
    static_headers: HeaderMap,
    client: Client,
    cache: Arc<CredentialCache<F>>,
}

impl<F: CredentialFetcher> RequestExecutor<F> {
    pub fn new(
        service: impl Into<String>,
        origin: BaseOrigin,
        tenant: TenantHeader,
        client: Client,
        cache: Arc<CredentialCache<F>>,
    ) -> Self {
        Self {
            service: service.into(),
            origin,
            tenant,
            static_headers: HeaderMap::new(),
            client,
            cache,
        }
    }

    pub fn with_static_headers(mut self, headers: HeaderMap) -> Result<Self, GatewayError> {
        validate_static_headers(&headers, &self.tenant)?;
        self.static_headers = headers;
        Ok(self)
    }

    pub fn from_config(
        service: &str,
        config: &UpstreamConfig,
        cache: Arc<CredentialCache<F>>,
    ) -> Result<Self, GatewayError> {
        let origin = BaseOrigin::parse(&config.base_url)?;
        let tenant = TenantHeader::parse(&config.tenant_header, &config.tenant_id)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| GatewayError::Configuration(format!("http client for '{service}': {err}")))?;

        info!(service, origin = origin.as_str(), "upstream configured");
        Self::new(service, origin, tenant, client, cache).with_static_headers(config.headers.clone())
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Call `endpoint_path` on the upstream origin and decode a non-empty 2xx
    /// body as JSON into `T`.
    ///
    /// A 401 or 403 forces one credential refresh and one retry; nothing else
    /// is retried. Non-2xx responses become [`GatewayError::Upstream`].
    pub async fn execute<T, B>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        endpoint_path: &str,
        body: Option<&B>,
    ) -> Result<UpstreamResponse<T>, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let raw = self.execute_raw(cancel, method, endpoint_path, body).await?;
        let body = raw
            .body
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(|err| GatewayError::transport(TransportPhase::DecodeResponse, err))?;

        Ok(UpstreamResponse {
            status: raw.status,
            headers: raw.headers,
            body,
        })
    }

    /// Same as [`RequestExecutor::execute`] without decoding: the 2xx body is
    /// returned as received, whatever its content type.
    pub async fn execute_raw<B>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        endpoint_path: &str,
        body: Option<&B>,
    ) -> Result<UpstreamResponse<Vec<u8>>, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.origin.resolve(endpoint_path)?;
        let operation = operation_name(&method, endpoint_path);
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| GatewayError::transport(TransportPhase::EncodeRequest, err))?;

        let metrics = get_metrics().await;
        let start = get_instant();

        let credential = self.cache.get(cancel).await?;
        let mut response = self
            .send(cancel, &method, &url, payload.as_deref(), &credential, TransportPhase::ExecuteRequest)
            .await?;

        if is_auth_failure(response.status()) {
            warn!(
                service = %self.service,
                operation = %operation,
                status = response.status().as_u16(),
                "upstream rejected credential, refreshing and retrying once"
            );
            metrics
                .upstream_auth_retries
                .with_label_values(&[self.service.as_str()])
                .inc();

            let credential = self.cache.force_refresh(cancel).await?;
            response = self
                .send(cancel, &method, &url, payload.as_deref(), &credential, TransportPhase::RetryAfterRefresh)
                .await?;
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Canceled),
            read = response.bytes() => read
                .map_err(|err| GatewayError::transport(TransportPhase::ReadResponse, err.without_url()))?,
        };

        metrics
            .upstream_requests
            .with_label_values(&[self.service.as_str(), method.as_str(), status_class(status)])
            .inc();
        metrics
            .upstream_request_duration
            .with_label_values(&[self.service.as_str()])
            .observe(start.elapsed().as_secs_f64());

        if !status.is_success() {
            let err = upstream_error(&self.service, &operation, status, &bytes);
            warn!(
                service = %self.service,
                operation = %operation,
                status = status.as_u16(),
                code = err.code.as_deref().unwrap_or(""),
                "upstream returned an error"
            );
            return Err(err.into());
        }

        debug!(service = %self.service, operation = %operation, status = status.as_u16(), body_bytes = bytes.len(), "upstream call succeeded");

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(bytes.to_vec())
        };

        Ok(UpstreamResponse { status, headers, body })
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        credential: &Credential,
        phase: TransportPhase,
    ) -> Result<reqwest::Response, GatewayError> {
        let headers = request_headers(&self.static_headers, &self.tenant, credential)?;
        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        if let Some(payload) = payload {
            builder = builder.body(payload.to_vec());
        }
        let request = builder
            .build()
            .map_err(|err| GatewayError::transport(TransportPhase::CreateRequest, err.without_url()))?;

        debug!(service = %self.service, method = %method, path = %sanitize(url.path()), phase = %phase, "sending upstream request");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Canceled),
            sent = self.client.execute(request) => {
                sent.map_err(|err| GatewayError::transport(phase, err.without_url()))
            }
        }
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// `"<METHOD> <path>"` without query or fragment, safe to display:
/// credentials are redacted and control characters flattened to spaces.
pub fn operation_name(method: &Method, endpoint_path: &str) -> String {
    let path = endpoint_path.split(['?', '#']).next().unwrap_or_default();
    let path = sanitize_bounded(path, MAX_OPERATION_PATH_BYTES).replace(['\n', '\t'], " ");
    format!("{method} {path}")
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_name_drops_query() {
        assert_eq!(operation_name(&Method::GET, "/v1/pages?slug=a/b"), "GET /v1/pages");
        assert_eq!(operation_name(&Method::POST, "/v1/pages"), "POST /v1/pages");
    }

    #[test]
    fn operation_name_redacts_credentials_and_control_characters() {
        let credential = format!("t1.path.{}", "p".repeat(86));
        let operation = operation_name(&Method::GET, &format!("/v1/tokens/{credential}\n\tx\u{1b}y"));

        assert_eq!(operation, "GET /v1/tokens/[REDACTED]  x y");
    }

    #[test]
    fn operation_name_is_bounded() {
        let operation = operation_name(&Method::GET, &format!("/{}", "a".repeat(1000)));
        assert!(operation.len() <= "GET ".len() + MAX_OPERATION_PATH_BYTES);
    }

    #[test]
    fn only_401_and_403_are_auth_failures() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_auth_failure(StatusCode::PROXY_AUTHENTICATION_REQUIRED));
    }
}
