use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::cache::credential::Credential;
use crate::errors::GatewayError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Tenant / organization identifier sent with every request
#[derive(Debug, Clone)]
pub struct TenantHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl TenantHeader {
    pub fn parse(name: &str, value: &str) -> Result<Self, GatewayError> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| GatewayError::Configuration("tenant header name is not a valid header name".to_owned()))?;
        if is_reserved(&name) {
            return Err(GatewayError::Configuration(format!(
                "tenant header must not be '{name}'"
            )));
        }
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| GatewayError::Configuration("tenant id is not a valid header value".to_owned()))?;
        if value.is_empty() {
            return Err(GatewayError::Configuration("tenant id must not be empty".to_owned()));
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }
}

/// Static headers may not shadow the ones the executor owns.
pub fn validate_static_headers(headers: &HeaderMap, tenant: &TenantHeader) -> Result<(), GatewayError> {
    for name in headers.keys() {
        if is_reserved(name) || name == tenant.name() {
            return Err(GatewayError::Configuration(format!(
                "static header '{name}' is managed by the gateway"
            )));
        }
    }
    Ok(())
}

/// Headers for one attempt: static ones, then content type, tenant and bearer.
pub fn request_headers(
    static_headers: &HeaderMap,
    tenant: &TenantHeader,
    credential: &Credential,
) -> Result<HeaderMap, GatewayError> {
    if credential.is_empty() {
        return Err(GatewayError::Configuration("credential is empty".to_owned()));
    }

    let mut headers = static_headers.clone();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(tenant.name.clone(), tenant.value.clone());

    let mut authorization = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
        // the message must not echo the value
        .map_err(|_| GatewayError::Configuration("credential is not a valid header value".to_owned()))?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);
    Ok(headers)
}

fn is_reserved(name: &HeaderName) -> bool {
    name == AUTHORIZATION || name == CONTENT_TYPE
}
