//! Error kinds shared by the credential cache and the request executor.
//!
//! Every free-form message stored in these types has already been through
//! [`crate::helpers::sanitize`], so `Display` output never carries a credential.

use std::fmt;

use thiserror::Error;

/// Outcome of one credential refresh cycle.
///
/// `Clone` because a single outcome is broadcast to every waiter of the cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The external fetch failed, timed out or was cancelled.
    #[error("credential fetch failed: {0}")]
    Fetch(String),

    /// The fetch succeeded but printed nothing usable.
    #[error("credential fetch output was empty")]
    Empty,

    /// The fetch succeeded but no credential could be extracted.
    #[error("credential not found in fetch output")]
    NotFound,

    /// The waiting caller gave up; the refresh itself keeps running.
    #[error("credential wait canceled")]
    Canceled,
}

impl CredentialError {
    pub fn is_format(&self) -> bool {
        matches!(self, CredentialError::Empty | CredentialError::NotFound)
    }
}

/// Fixed, allow-listable prefixes for transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    EncodeRequest,
    CreateRequest,
    ExecuteRequest,
    RetryAfterRefresh,
    ReadResponse,
    DecodeResponse,
}

impl TransportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportPhase::EncodeRequest => "encode request",
            TransportPhase::CreateRequest => "create request",
            TransportPhase::ExecuteRequest => "execute request",
            TransportPhase::RetryAfterRefresh => "failed retry after credential refresh",
            TransportPhase::ReadResponse => "read response",
            TransportPhase::DecodeResponse => "decode response",
        }
    }
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured non-2xx response from a backend service.
///
/// `service`, `operation`, `http_status`, `code` and `message` are safe to show;
/// `sanitized_details` is a bounded diagnostic snippet of the response body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{service} {operation} failed with HTTP {http_status}: {message}")]
pub struct UpstreamError {
    pub service: String,
    pub operation: String,
    pub http_status: u16,
    pub code: Option<String>,
    pub message: String,
    pub sanitized_details: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid origin, endpoint path or header configuration. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("{phase}: {message}")]
    Transport {
        phase: TransportPhase,
        message: String,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("request canceled")]
    Canceled,
}

impl GatewayError {
    pub fn transport(phase: TransportPhase, err: impl fmt::Display) -> Self {
        let message = crate::helpers::sanitize::sanitize(&err.to_string()).into_owned();
        GatewayError::Transport { phase, message }
    }

    /// Text that may cross a user- or model-facing boundary.
    ///
    /// Built from fixed strings and the display-safe upstream fields only.
    pub fn safe_message(&self) -> String {
        match self {
            GatewayError::Configuration(_) => "configuration error".to_owned(),
            GatewayError::Credential(CredentialError::Canceled) | GatewayError::Canceled => {
                "request canceled".to_owned()
            }
            GatewayError::Credential(err) if err.is_format() => {
                "credential unavailable: unexpected credential format".to_owned()
            }
            GatewayError::Credential(_) => "credential unavailable".to_owned(),
            GatewayError::Transport { phase, .. } => format!("upstream request failed: {phase}"),
            GatewayError::Upstream(err) => match &err.code {
                Some(code) => format!(
                    "{} {} failed with HTTP {} ({}): {}",
                    err.service, err.operation, err.http_status, code, err.message
                ),
                None => format!(
                    "{} {} failed with HTTP {}: {}",
                    err.service, err.operation, err.http_status, err.message
                ),
            },
        }
    }
}

pub const GENERIC_ERROR_MESSAGE: &str = "internal error";

/// Collapse an arbitrary error to display-safe text.
///
/// Known gateway errors anywhere in the chain map to their safe message;
/// anything else becomes [`GENERIC_ERROR_MESSAGE`].
pub fn safe_error_message(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if let Some(gateway) = cause.downcast_ref::<GatewayError>() {
            return gateway.safe_message();
        }
        if let Some(credential) = cause.downcast_ref::<CredentialError>() {
            return GatewayError::Credential(credential.clone()).safe_message();
        }
        if let Some(upstream) = cause.downcast_ref::<UpstreamError>() {
            return GatewayError::Upstream(upstream.clone()).safe_message();
        }
    }
    GENERIC_ERROR_MESSAGE.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn transport_messages_are_sanitized() {
        let credential = format!("t1.k.{}", "q".repeat(86));
        let err = GatewayError::transport(
            TransportPhase::ExecuteRequest,
            format!("connection reset while sending {credential}"),
        );

        let text = err.to_string();
        assert!(text.starts_with("execute request: "));
        assert!(!text.contains(&credential));
    }

    #[test]
    fn safe_message_exposes_only_phase_for_transport() {
        let err = GatewayError::transport(TransportPhase::RetryAfterRefresh, "tcp connect error 10.0.0.7:443");
        assert_eq!(err.safe_message(), "upstream request failed: failed retry after credential refresh");
    }

    #[test]
    fn unknown_errors_collapse_to_generic_message() {
        let err = anyhow!("raw stderr: secret stuff");
        assert_eq!(safe_error_message(&err), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn wrapped_gateway_errors_are_recognised() {
        let upstream = UpstreamError {
            service: "pages".into(),
            operation: "GET /v1/pages".into(),
            http_status: 404,
            code: Some("not_found".into()),
            message: "page missing".into(),
            sanitized_details: "{\"internal\":\"trace\"}".into(),
        };
        let err = anyhow::Error::new(GatewayError::from(upstream)).context("tool call failed");

        let message = safe_error_message(&err);
        assert_eq!(message, "pages GET /v1/pages failed with HTTP 404 (not_found): page missing");
        assert!(!message.contains("trace"));
    }

    #[test]
    fn cancellation_is_distinct_from_fetch_failure() {
        let canceled = GatewayError::from(CredentialError::Canceled);
        let failed = GatewayError::from(CredentialError::Fetch("credential command exited with status 1".into()));
        assert_ne!(canceled.safe_message(), failed.safe_message());
    }
}
