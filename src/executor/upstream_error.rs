use http::StatusCode;
use serde_json::Value;

use crate::errors::UpstreamError;
use crate::helpers::sanitize::{sanitize_bounded, sanitize_details};

const MAX_CODE_BYTES: usize = 64;
const MAX_MESSAGE_BYTES: usize = 512;

/// Turn a non-2xx response into an [`UpstreamError`].
///
/// Code and message come from a JSON error body when it has a known shape;
/// otherwise the message falls back to the status reason phrase.
pub fn upstream_error(service: &str, operation: &str, status: StatusCode, body: &[u8]) -> UpstreamError {
    let (code, message) = parse_error_body(body);

    let message = message
        .map(|message| sanitize_bounded(&message, MAX_MESSAGE_BYTES))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| status_text(status));

    UpstreamError {
        service: service.to_owned(),
        operation: operation.to_owned(),
        http_status: status.as_u16(),
        code: code
            .map(|code| sanitize_bounded(&code, MAX_CODE_BYTES))
            .filter(|code| !code.trim().is_empty()),
        message,
        sanitized_details: sanitize_details(body),
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Supported shapes:
/// - `{"code": "..", "message": ".."}`
/// - `{"error": {"code": "..", "message": ".."}}`
/// - `{"error": "..", "error_description": ".."}`
/// - `{"errors": [{"code": "..", "message": ".."}]}`
fn parse_error_body(body: &[u8]) -> (Option<String>, Option<String>) {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return (None, None);
    };
    let Some(object) = json.as_object() else {
        return (None, None);
    };

    if let Some(error) = object.get("error") {
        match error {
            Value::Object(_) => return code_and_message(error),
            Value::String(code) => {
                let message = object
                    .get("error_description")
                    .or_else(|| object.get("message"))
                    .and_then(scalar_text);
                return (Some(code.to_owned()), message);
            }
            _ => {}
        }
    }

    if let Some(first) = object
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return code_and_message(first);
    }

    code_and_message(&json)
}

fn code_and_message(value: &Value) -> (Option<String>, Option<String>) {
    let code = value.get("code").and_then(scalar_text);
    let message = value
        .get("message")
        .or_else(|| value.get("detail"))
        .and_then(scalar_text);
    (code, message)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_error_body() {
        let body = br#"{"code":"validation_failed","message":"slug is required"}"#;
        let err = upstream_error("pages", "POST /v1/pages", StatusCode::UNPROCESSABLE_ENTITY, body);

        assert_eq!(err.http_status, 422);
        assert_eq!(err.code.as_deref(), Some("validation_failed"));
        assert_eq!(err.message, "slug is required");
        assert_eq!(err.sanitized_details, String::from_utf8_lossy(body));
    }

    #[test]
    fn parses_nested_error_object() {
        let body = br#"{"error":{"code":404,"message":"no such page"}}"#;
        let err = upstream_error("pages", "GET /v1/pages/9", StatusCode::NOT_FOUND, body);

        assert_eq!(err.code.as_deref(), Some("404"));
        assert_eq!(err.message, "no such page");
    }

    #[test]
    fn parses_oauth_style_error() {
        let body = br#"{"error":"invalid_token","error_description":"token expired"}"#;
        let err = upstream_error("auth", "GET /v1/me", StatusCode::UNAUTHORIZED, body);

        assert_eq!(err.code.as_deref(), Some("invalid_token"));
        assert_eq!(err.message, "token expired");
    }

    #[test]
    fn parses_errors_array() {
        let body = br#"{"errors":[{"code":"rate_limited","message":"slow down"},{"code":"other"}]}"#;
        let err = upstream_error("pages", "GET /v1/pages", StatusCode::TOO_MANY_REQUESTS, body);

        assert_eq!(err.code.as_deref(), Some("rate_limited"));
        assert_eq!(err.message, "slow down");
    }

    #[test]
    fn falls_back_to_status_text() {
        let err = upstream_error("pages", "GET /v1/pages", StatusCode::BAD_GATEWAY, b"<html>upstream down</html>");

        assert_eq!(err.code, None);
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.sanitized_details, "<html>upstream down</html>");
    }

    #[test]
    fn redacts_credentials_in_all_fields() {
        let credential = format!("t1.leak.{}", "c".repeat(86));
        let body = format!(r#"{{"code":"{credential}","message":"bad token {credential}"}}"#);
        let err = upstream_error("pages", "GET /v1/pages", StatusCode::FORBIDDEN, body.as_bytes());

        assert!(!err.code.clone().unwrap_or_default().contains(&credential));
        assert!(!err.message.contains(&credential));
        assert!(!err.sanitized_details.contains(&credential));
    }

    #[test]
    fn bounds_long_messages() {
        let body = format!(r#"{{"message":"{}"}}"#, "m".repeat(5000));
        let err = upstream_error("pages", "GET /v1/pages", StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes());

        assert!(err.message.len() <= MAX_MESSAGE_BYTES);
        assert!(err.sanitized_details.len() <= 4096);
    }
}
